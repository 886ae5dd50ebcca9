//! Data quality evaluators: empty values, missing values, new values.

use async_trait::async_trait;

use crate::Result;
use crate::metrics::{CountEmptyHistogram, UniqueValueCountHistogram};
use crate::models::{DataQualityCondition, UniqueValueSet, Violation};

use super::MonitorEvaluator;

/// Flags dimensions whose ratio of empty values in the production dataset
/// breaches the threshold.
pub struct EmptyValueEvaluator {
    condition: DataQualityCondition,
    metric: CountEmptyHistogram,
}

impl EmptyValueEvaluator {
    /// Creates the evaluator from the monitor condition and the empty-count
    /// histogram bound to the production dataset.
    pub fn new(condition: DataQualityCondition, metric: CountEmptyHistogram) -> Self {
        Self { condition, metric }
    }
}

#[async_trait]
impl MonitorEvaluator for EmptyValueEvaluator {
    async fn evaluate(&self) -> Result<Vec<Violation>> {
        let stats = self
            .metric
            .aggregate(&self.condition.dimensions.features, &self.condition.evaluation_window)
            .await?;

        let mut violations = Vec::new();
        for dimension in &self.condition.dimensions.features {
            // A dimension with no observed rows has nothing to breach.
            let Some(dimension_stats) = stats.get(dimension) else {
                continue;
            };
            if self.condition.threshold.breached(dimension_stats.empty_percentage) {
                violations.push(Violation {
                    dimension: dimension.clone(),
                    metric_value: dimension_stats.empty_percentage,
                    threshold: self.condition.threshold,
                });
            }
        }
        Ok(violations)
    }
}

/// Flags dimensions where categorical values present in the baseline are
/// absent from production beyond the threshold's tolerance.
pub struct MissingValueEvaluator {
    condition: DataQualityCondition,
    baseline_metric: UniqueValueCountHistogram,
    production_metric: UniqueValueCountHistogram,
}

impl MissingValueEvaluator {
    /// Creates the evaluator from the monitor condition plus the
    /// unique-value histograms of the baseline (batch) and production
    /// (event) datasets.
    pub fn new(
        condition: DataQualityCondition,
        baseline_metric: UniqueValueCountHistogram,
        production_metric: UniqueValueCountHistogram,
    ) -> Self {
        Self {
            condition,
            baseline_metric,
            production_metric,
        }
    }
}

#[async_trait]
impl MonitorEvaluator for MissingValueEvaluator {
    async fn evaluate(&self) -> Result<Vec<Violation>> {
        let dimensions = &self.condition.dimensions.features;
        let window = &self.condition.evaluation_window;
        let baseline = self.baseline_metric.aggregate(dimensions, window).await?;
        let production = self.production_metric.aggregate(dimensions, window).await?;

        Ok(set_difference_violations(
            &self.condition,
            dimensions,
            |dimension| difference_count(baseline.get(dimension), production.get(dimension)),
        ))
    }
}

/// Flags dimensions where production shows categorical values absent from
/// the baseline beyond the threshold's tolerance. Inverse of
/// [`MissingValueEvaluator`].
pub struct NewValueEvaluator {
    condition: DataQualityCondition,
    baseline_metric: UniqueValueCountHistogram,
    production_metric: UniqueValueCountHistogram,
}

impl NewValueEvaluator {
    /// Creates the evaluator from the monitor condition plus the
    /// unique-value histograms of the baseline and production datasets.
    pub fn new(
        condition: DataQualityCondition,
        baseline_metric: UniqueValueCountHistogram,
        production_metric: UniqueValueCountHistogram,
    ) -> Self {
        Self {
            condition,
            baseline_metric,
            production_metric,
        }
    }
}

#[async_trait]
impl MonitorEvaluator for NewValueEvaluator {
    async fn evaluate(&self) -> Result<Vec<Violation>> {
        let dimensions = &self.condition.dimensions.features;
        let window = &self.condition.evaluation_window;
        let baseline = self.baseline_metric.aggregate(dimensions, window).await?;
        let production = self.production_metric.aggregate(dimensions, window).await?;

        Ok(set_difference_violations(
            &self.condition,
            dimensions,
            |dimension| difference_count(production.get(dimension), baseline.get(dimension)),
        ))
    }
}

/// Number of values in `from` that are absent from `without`.
fn difference_count(from: Option<&UniqueValueSet>, without: Option<&UniqueValueSet>) -> u64 {
    let Some(from) = from else { return 0 };
    match without {
        Some(without) => from.difference(without).count() as u64,
        None => from.len() as u64,
    }
}

fn set_difference_violations(
    condition: &DataQualityCondition,
    dimensions: &[String],
    count: impl Fn(&str) -> u64,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for dimension in dimensions {
        let metric_value = count(dimension) as f64;
        if condition.threshold.breached(metric_value) {
            violations.push(Violation {
                dimension: dimension.clone(),
                metric_value,
                threshold: condition.threshold,
            });
        }
    }
    violations
}
