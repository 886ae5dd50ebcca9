//! The monitor processing pass.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::Result;
use crate::error::DataWatchError;
use crate::evaluators::{
    EmptyValueEvaluator, MissingValueEvaluator, MonitorEvaluator, NewValueEvaluator,
};
use crate::metrics::{CountEmptyHistogram, UniqueValueCountHistogram};
use crate::models::{
    Alert, AlertIdentification, AlertViolation, DataQualityCondition, DataQualityMetric, Dataset,
    DatasetType, Monitor, MonitorSpec, Violation,
};
use crate::notify::IntegrationService;
use crate::stores::{
    AlertDedupQuery, AlertStore, DatasetQuery, DatasetStore, MonitorStore, RowCollection, RowStore,
};

/// Runs one processing pass for one monitor.
///
/// The processor evaluates the monitor's metric, deduplicates each violation
/// against the alert history, persists new alerts, dispatches notifications,
/// and finally advances the monitor's `last_run` marker. One constructed
/// processor corresponds to one scheduled invocation; every collaborator is
/// injected.
///
/// There is no partial-success rollback: a failure mid-loop leaves already
/// created alerts persisted (at-least-once alert creation on retry).
pub struct MonitorProcessor {
    monitor: Monitor,
    datasets: Arc<dyn DatasetStore>,
    alerts: Arc<dyn AlertStore>,
    monitors: Arc<dyn MonitorStore>,
    rows: Arc<dyn RowStore>,
    integrations: Arc<IntegrationService>,
}

impl MonitorProcessor {
    /// Creates a processor for one monitor over the injected stores.
    pub fn new(
        monitor: Monitor,
        datasets: Arc<dyn DatasetStore>,
        alerts: Arc<dyn AlertStore>,
        monitors: Arc<dyn MonitorStore>,
        rows: Arc<dyn RowStore>,
        integrations: Arc<IntegrationService>,
    ) -> Self {
        Self {
            monitor,
            datasets,
            alerts,
            monitors,
            rows,
            integrations,
        }
    }

    /// Processes the monitor and returns the raw violation list.
    ///
    /// The returned violations are pre-dedup: a violation that was
    /// suppressed as a duplicate still appears. Which alerts were actually
    /// created is visible only in the alert store.
    ///
    /// # Errors
    /// Dataset and condition resolution errors abort the pass before any
    /// alert is created, and `last_run` is not advanced. Notification
    /// errors are logged and contained.
    pub async fn process(&self) -> Result<Vec<Violation>> {
        let condition = match &self.monitor.spec {
            MonitorSpec::DataQuality(condition) => condition,
            MonitorSpec::Drift(_) | MonitorSpec::Performance(_) => {
                return Err(DataWatchError::UnsupportedMonitorType {
                    monitor_type: self.monitor.spec.monitor_type().to_string(),
                });
            }
        };

        let violations = self.evaluate_data_quality(condition).await?;
        tracing::info!(
            "Evaluation done for monitor [{}]: {} violation(s)",
            self.monitor.monitor_id,
            violations.len()
        );

        for violation in &violations {
            let dedup = AlertDedupQuery {
                model_version_id: self.model_version_id(),
                field: violation.dimension.clone(),
                focal_time_window: condition.evaluation_window.clone(),
                max_threshold: violation.threshold.value,
            };
            if self.alerts.count_matching(&dedup).await? > 0 {
                tracing::debug!(
                    "Suppressing duplicate violation for dimension [{}] of monitor [{}]",
                    violation.dimension,
                    self.monitor.monitor_id
                );
                continue;
            }

            let alert = self.create_alert(condition, violation).await?;
            if let Some(integration_id) = self.monitor.integration_id
                && let Err(error) = self
                    .integrations
                    .send_alert(&alert, condition, integration_id)
                    .await
            {
                // The alert is already persisted; delivery failures must not
                // abort the remaining violations of this pass.
                tracing::warn!(
                    "Notification failed for alert [{}] of monitor [{}]: {}",
                    alert.alert_id,
                    self.monitor.monitor_id,
                    error
                );
            }
        }

        self.monitors
            .update_last_run(self.monitor.monitor_id, Utc::now())
            .await?;

        Ok(violations)
    }

    /// Builds the evaluator for the condition's metric and runs it.
    async fn evaluate_data_quality(
        &self,
        condition: &DataQualityCondition,
    ) -> Result<Vec<Violation>> {
        match condition.evaluation_metric {
            DataQualityMetric::EmptyValue => {
                let event = self.event_dataset().await?;
                EmptyValueEvaluator::new(
                    condition.clone(),
                    CountEmptyHistogram::new(
                        Arc::clone(&self.rows),
                        RowCollection::EventRows,
                        event.dataset_id,
                    ),
                )
                .evaluate()
                .await
            }
            DataQualityMetric::MissingValue => {
                let (baseline, production) = self.unique_value_metrics().await?;
                MissingValueEvaluator::new(condition.clone(), baseline, production)
                    .evaluate()
                    .await
            }
            DataQualityMetric::NewValue => {
                let (baseline, production) = self.unique_value_metrics().await?;
                NewValueEvaluator::new(condition.clone(), baseline, production)
                    .evaluate()
                    .await
            }
        }
    }

    /// Binds the baseline (batch) and production (event) unique-value
    /// histograms for the set-comparison evaluators.
    async fn unique_value_metrics(
        &self,
    ) -> Result<(UniqueValueCountHistogram, UniqueValueCountHistogram)> {
        let batch = self.batch_dataset().await?;
        let event = self.event_dataset().await?;
        Ok((
            UniqueValueCountHistogram::new(
                Arc::clone(&self.rows),
                RowCollection::BatchRows,
                batch.dataset_id,
            ),
            UniqueValueCountHistogram::new(
                Arc::clone(&self.rows),
                RowCollection::EventRows,
                event.dataset_id,
            ),
        ))
    }

    /// Resolves the production dataset of the monitored model version.
    async fn event_dataset(&self) -> Result<Dataset> {
        self.first_dataset(DatasetType::Event, "event_dataset").await
    }

    /// Resolves the reference dataset of the monitored model version.
    async fn batch_dataset(&self) -> Result<Dataset> {
        self.first_dataset(DatasetType::Batch, "batch_dataset").await
    }

    async fn first_dataset(&self, dataset_type: DatasetType, entity: &str) -> Result<Dataset> {
        let query = DatasetQuery {
            model_version_id: self.model_version_id(),
            dataset_type,
        };
        // The store orders by created_at ascending; "first" is the earliest
        // created dataset when several match.
        self.datasets
            .find_datasets(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DataWatchError::entity_not_found(entity, self.model_version_id().to_string())
            })
    }

    async fn create_alert(
        &self,
        condition: &DataQualityCondition,
        violation: &Violation,
    ) -> Result<Alert> {
        let alert = Alert {
            alert_id: Uuid::new_v4(),
            monitor_id: self.monitor.monitor_id,
            model_id: self.model_id(),
            monitor_type: self.monitor.spec.monitor_type(),
            alert_identification: AlertIdentification {
                model_id: self.model_id(),
                model_version_id: self.model_version_id(),
            },
            violation: AlertViolation {
                field: violation.dimension.clone(),
                max_threshold: violation.threshold.value,
                model_version_id: self.model_version_id(),
                focal_time_window: condition.evaluation_window.clone(),
                focal_value: violation.metric_value,
            },
            created_at: Utc::now(),
        };
        self.alerts.insert_alert(alert).await
    }

    fn model_id(&self) -> Uuid {
        self.monitor.monitor_identification.model_id
    }

    fn model_version_id(&self) -> Uuid {
        self.monitor.monitor_identification.model_version_id
    }
}
