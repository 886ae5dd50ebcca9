//! Domain model for monitors, datasets, violations, alerts, and integrations.
//!
//! The serde shapes in this module are the store compatibility surface: field
//! names and enum string values match the persisted documents exactly, so a
//! deployment can interoperate with an existing store. Monitor conditions and
//! integration configurations are tagged unions rather than flat maps, which
//! makes evaluator and transport selection an exhaustive match.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DataWatchError;

/// Comparison operator of a monitor threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOperator {
    /// Observation strictly greater than the threshold value
    Gt,
    /// Observation strictly less than the threshold value
    Lt,
    /// Observation greater than or equal to the threshold value
    Gte,
    /// Observation less than or equal to the threshold value
    Lte,
    /// Observation exactly equal to the threshold value
    Eq,
}

impl ThresholdOperator {
    /// Returns the persisted token for this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Eq => "eq",
        }
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdOperator {
    type Err = DataWatchError;

    /// Parses an operator token.
    ///
    /// # Errors
    /// Returns `UnsupportedOperator` for any token outside the supported set.
    /// Unknown operators are never treated as "no breach".
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "gte" => Ok(Self::Gte),
            "lte" => Ok(Self::Lte),
            "eq" => Ok(Self::Eq),
            other => Err(DataWatchError::UnsupportedOperator {
                operator: other.to_string(),
            }),
        }
    }
}

/// Threshold of a monitor condition: operator plus numeric bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorThreshold {
    /// Comparison operator
    pub operator: ThresholdOperator,
    /// Numeric bound the observation is compared against
    pub value: f64,
}

impl MonitorThreshold {
    /// Creates a threshold.
    pub fn new(operator: ThresholdOperator, value: f64) -> Self {
        Self { operator, value }
    }

    /// Decides whether an observed value breaches this threshold.
    ///
    /// Comparison uses the dataset's native floating-point precision with no
    /// tolerance applied, so boundary equality for `gte`/`lte` is exact.
    #[allow(clippy::float_cmp)]
    pub fn breached(&self, observed: f64) -> bool {
        match self.operator {
            ThresholdOperator::Gt => observed > self.value,
            ThresholdOperator::Lt => observed < self.value,
            ThresholdOperator::Gte => observed >= self.value,
            ThresholdOperator::Lte => observed <= self.value,
            ThresholdOperator::Eq => observed == self.value,
        }
    }
}

/// Monitor family. Only data quality is processable today; the other
/// variants are the extension point for future monitor families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorType {
    /// Data quality monitor (empty / missing / new values)
    DataQuality,
    /// Distribution drift monitor
    Drift,
    /// Model performance monitor
    Performance,
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataQuality => f.write_str("DATA_QUALITY"),
            Self::Drift => f.write_str("DRIFT"),
            Self::Performance => f.write_str("PERFORMANCE"),
        }
    }
}

/// Data quality evaluation metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQualityMetric {
    /// Ratio of empty values in the production dataset
    EmptyValue,
    /// Baseline categorical values absent from production
    MissingValue,
    /// Production categorical values absent from the baseline
    NewValue,
}

/// Drift evaluation metric (extension point, not processable yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftMetric {
    /// Population stability index
    Psi,
}

/// Performance evaluation metric (extension point, not processable yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceMetric {
    /// Precision of the positive class
    Precision,
    /// Recall of the positive class
    Recall,
    /// F1 score
    F1,
}

/// Severity assigned to a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorSeverity {
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity
    High,
}

/// Feature dimensions a monitor evaluates independently.
///
/// Order is significant: violations are emitted, deduplicated, and notified
/// in this iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorDimensions {
    /// Feature names, in evaluation order
    pub features: Vec<String>,
}

impl MonitorDimensions {
    /// Creates a dimension set from feature names.
    pub fn new(features: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            features: features.into_iter().map(Into::into).collect(),
        }
    }
}

fn default_evaluation_window() -> String {
    "3d".to_string()
}

/// Condition of a data quality monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityCondition {
    /// Which statistic the evaluator computes
    pub evaluation_metric: DataQualityMetric,
    /// Threshold the statistic is compared against
    pub threshold: MonitorThreshold,
    /// Feature dimensions evaluated independently
    pub dimensions: MonitorDimensions,
    /// Lookback window label (e.g. `24h`, `7d`); also part of the alert
    /// deduplication identity
    #[serde(default = "default_evaluation_window")]
    pub evaluation_window: String,
}

/// Condition of a drift monitor (extension point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftCondition {
    /// Drift statistic
    pub evaluation_metric: DriftMetric,
    /// Threshold the statistic is compared against
    pub threshold: MonitorThreshold,
    /// Lookback window label
    #[serde(default = "default_evaluation_window")]
    pub evaluation_window: String,
}

/// Condition of a performance monitor (extension point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCondition {
    /// Performance statistic
    pub evaluation_metric: PerformanceMetric,
    /// Threshold the statistic is compared against
    pub threshold: MonitorThreshold,
    /// Lookback window label
    #[serde(default = "default_evaluation_window")]
    pub evaluation_window: String,
}

/// Monitor type plus its type-specific condition, as one tagged union.
///
/// The condition shape depends on the monitor type, so the pair is modeled
/// as a sum type rather than a shared flat record; dispatch over it is an
/// exhaustive match. Serializes to sibling `monitor_type` /
/// `monitor_condition` fields, matching the persisted document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "monitor_type", content = "monitor_condition")]
pub enum MonitorSpec {
    /// Data quality monitor condition
    #[serde(rename = "DATA_QUALITY")]
    DataQuality(DataQualityCondition),
    /// Drift monitor condition
    #[serde(rename = "DRIFT")]
    Drift(DriftCondition),
    /// Performance monitor condition
    #[serde(rename = "PERFORMANCE")]
    Performance(PerformanceCondition),
}

impl MonitorSpec {
    /// Returns the monitor type tag of this spec.
    pub fn monitor_type(&self) -> MonitorType {
        match self {
            Self::DataQuality(_) => MonitorType::DataQuality,
            Self::Drift(_) => MonitorType::Drift,
            Self::Performance(_) => MonitorType::Performance,
        }
    }
}

/// Binding of a monitor to a model and model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorIdentification {
    /// Model the monitor belongs to
    pub model_id: Uuid,
    /// Model version whose datasets are evaluated
    pub model_version_id: Uuid,
}

/// Persisted monitor definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    /// Monitor identity
    pub monitor_id: Uuid,
    /// Human-readable name
    pub monitor_name: String,
    /// Model / model version binding
    pub monitor_identification: MonitorIdentification,
    /// Monitor type and its condition
    #[serde(flatten)]
    pub spec: MonitorSpec,
    /// Severity assigned by the author
    pub severity: MonitorSeverity,
    /// Notification integration, if any
    #[serde(default)]
    pub integration_id: Option<Uuid>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last completed processing pass. Advances monotonically
    /// after every pass, violations or not.
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

/// Kind of a physical dataset attached to a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    /// Production / streaming rows
    Event,
    /// Reference rows uploaded once (training, validation, testing)
    Batch,
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => f.write_str("EVENT"),
            Self::Batch => f.write_str("BATCH"),
        }
    }
}

/// Environment a dataset was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Training data
    Training,
    /// Testing data
    Testing,
    /// Validation data
    Validation,
    /// Production traffic
    Production,
}

/// Persisted dataset record: one concrete table/stream of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset identity
    pub dataset_id: Uuid,
    /// Human-readable name
    pub dataset_name: String,
    /// Event or batch
    pub dataset_type: DatasetType,
    /// Capture environment
    pub environment: Environment,
    /// Owning model
    pub model_id: Uuid,
    /// Owning model version
    pub model_version_id: Uuid,
    /// Creation time; resolver ordering key
    pub created_at: DateTime<Utc>,
}

/// One column value within a dataset row.
///
/// `None` and the empty string both count as empty for the quality metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowColumn {
    /// Column / feature name
    pub name: String,
    /// Categorical value; `None` for a missing entry
    pub value: Option<String>,
}

/// Raw dataset row the metric kernels aggregate over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Row identity
    pub row_id: Uuid,
    /// Dataset the row belongs to
    pub dataset_id: Uuid,
    /// Ingestion time; window filtering key
    pub created_at: DateTime<Utc>,
    /// Column values
    pub columns: Vec<RowColumn>,
}

/// An in-memory record that a dimension breached its threshold in the
/// current pass. Violations are never persisted directly; the deduplicated
/// materialization is an [`Alert`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Feature dimension that breached
    pub dimension: String,
    /// Observed statistic
    pub metric_value: f64,
    /// Threshold that was breached
    pub threshold: MonitorThreshold,
}

/// Model binding carried on an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertIdentification {
    /// Model the alert belongs to
    pub model_id: Uuid,
    /// Model version the alert was raised for
    pub model_version_id: Uuid,
}

/// Persisted violation payload of an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertViolation {
    /// Feature dimension that breached
    pub field: String,
    /// Threshold value that was breached
    pub max_threshold: f64,
    /// Model version the violation was observed on
    pub model_version_id: Uuid,
    /// Evaluation window label the metric was computed over
    pub focal_time_window: String,
    /// Observed metric value
    pub focal_value: f64,
}

/// Persisted, deduplicated materialization of a violation. Append-only:
/// alerts are never updated or deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert identity, supplied by the pipeline on insert
    pub alert_id: Uuid,
    /// Monitor that raised the alert
    pub monitor_id: Uuid,
    /// Model the alert belongs to
    pub model_id: Uuid,
    /// Monitor family the alert came from
    pub monitor_type: MonitorType,
    /// Model / model version binding
    pub alert_identification: AlertIdentification,
    /// Violation payload
    pub violation: AlertViolation,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Category of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationKind {
    /// Outbound monitoring/notification channel
    Monitoring,
    /// Inbound data source
    DataSource,
}

/// Type-specific integration configuration, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntegrationConfig {
    /// Slack chat integration
    #[serde(rename = "SLACK")]
    Slack {
        /// Channel messages are posted to
        channel: String,
        /// Bot token used for authentication
        token: String,
    },
    /// Microsoft Teams webhook integration
    #[serde(rename = "TEAMS")]
    Teams {
        /// Incoming webhook URL
        webhook_url: String,
    },
}

impl IntegrationConfig {
    /// Returns the configured type tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Slack { .. } => "SLACK",
            Self::Teams { .. } => "TEAMS",
        }
    }
}

/// Persisted external notification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    /// Integration identity
    pub integration_id: Uuid,
    /// Category of the integration
    pub integration: IntegrationKind,
    /// Name of the connected application
    pub app_name: String,
    /// Type-specific configuration
    pub configuration: IntegrationConfig,
}

/// Distinct categorical values observed for one dimension.
pub type UniqueValueSet = BTreeSet<String>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_parse_known_tokens() {
        for (token, expected) in [
            ("gt", ThresholdOperator::Gt),
            ("lt", ThresholdOperator::Lt),
            ("gte", ThresholdOperator::Gte),
            ("lte", ThresholdOperator::Lte),
            ("eq", ThresholdOperator::Eq),
        ] {
            assert_eq!(token.parse::<ThresholdOperator>().unwrap(), expected);
            assert_eq!(expected.as_str(), token);
        }
    }

    #[test]
    fn test_operator_parse_unknown_token() {
        let result = "between".parse::<ThresholdOperator>();
        match result {
            Err(DataWatchError::UnsupportedOperator { operator }) => {
                assert_eq!(operator, "between");
            }
            other => panic!("expected UnsupportedOperator, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_breached_strict_operators() {
        let gt = MonitorThreshold::new(ThresholdOperator::Gt, 10.0);
        assert!(gt.breached(10.5));
        assert!(!gt.breached(10.0));
        assert!(!gt.breached(9.9));

        let lt = MonitorThreshold::new(ThresholdOperator::Lt, 10.0);
        assert!(lt.breached(9.9));
        assert!(!lt.breached(10.0));
    }

    #[test]
    fn test_threshold_breached_boundary_equality() {
        // gte/lte must treat exact boundary values as breaches
        let gte = MonitorThreshold::new(ThresholdOperator::Gte, 10.0);
        assert!(gte.breached(10.0));
        assert!(gte.breached(10.1));
        assert!(!gte.breached(9.999_999));

        let lte = MonitorThreshold::new(ThresholdOperator::Lte, 10.0);
        assert!(lte.breached(10.0));
        assert!(!lte.breached(10.000_001));

        let eq = MonitorThreshold::new(ThresholdOperator::Eq, 0.25);
        assert!(eq.breached(0.25));
        assert!(!eq.breached(0.250_001));
    }

    #[test]
    fn test_threshold_serde_shape() {
        let threshold = MonitorThreshold::new(ThresholdOperator::Gte, 10.0);
        let value = serde_json::to_value(&threshold).unwrap();
        assert_eq!(value, json!({"operator": "gte", "value": 10.0}));
    }

    #[test]
    fn test_monitor_serde_shape() {
        let monitor = Monitor {
            monitor_id: Uuid::nil(),
            monitor_name: "M1".to_string(),
            monitor_identification: MonitorIdentification {
                model_id: Uuid::nil(),
                model_version_id: Uuid::nil(),
            },
            spec: MonitorSpec::DataQuality(DataQualityCondition {
                evaluation_metric: DataQualityMetric::EmptyValue,
                threshold: MonitorThreshold::new(ThresholdOperator::Gt, 10.0),
                dimensions: MonitorDimensions::new(["f1", "f2"]),
                evaluation_window: "24h".to_string(),
            }),
            severity: MonitorSeverity::Low,
            integration_id: None,
            created_at: Utc::now(),
            last_run: None,
        };

        let value = serde_json::to_value(&monitor).unwrap();

        // The spec flattens into sibling monitor_type / monitor_condition
        // fields; this is the persisted document layout.
        assert_eq!(value["monitor_type"], "DATA_QUALITY");
        assert_eq!(value["monitor_condition"]["evaluation_metric"], "EMPTY_VALUE");
        assert_eq!(value["monitor_condition"]["threshold"]["operator"], "gt");
        assert_eq!(
            value["monitor_condition"]["dimensions"]["features"],
            json!(["f1", "f2"])
        );

        let roundtrip: Monitor = serde_json::from_value(value).unwrap();
        assert_eq!(roundtrip, monitor);
    }

    #[test]
    fn test_monitor_condition_default_window() {
        let condition: DataQualityCondition = serde_json::from_value(json!({
            "evaluation_metric": "MISSING_VALUE",
            "threshold": {"operator": "gt", "value": 0.0},
            "dimensions": {"features": ["f1"]}
        }))
        .unwrap();

        assert_eq!(condition.evaluation_window, "3d");
    }

    #[test]
    fn test_integration_config_serde_shape() {
        let config = IntegrationConfig::Slack {
            channel: "#alerts".to_string(),
            token: "xoxb-1".to_string(),
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({"type": "SLACK", "channel": "#alerts", "token": "xoxb-1"})
        );

        let teams: IntegrationConfig =
            serde_json::from_value(json!({"type": "TEAMS", "webhook_url": "https://x"})).unwrap();
        assert_eq!(teams.type_name(), "TEAMS");
    }

    #[test]
    fn test_alert_violation_serde_shape() {
        let violation = AlertViolation {
            field: "f1".to_string(),
            max_threshold: 10.0,
            model_version_id: Uuid::nil(),
            focal_time_window: "24h".to_string(),
            focal_value: 11.0,
        };

        let value = serde_json::to_value(&violation).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 5);
        for key in [
            "field",
            "max_threshold",
            "model_version_id",
            "focal_time_window",
            "focal_value",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn test_monitor_spec_type_tags() {
        let spec = MonitorSpec::Drift(DriftCondition {
            evaluation_metric: DriftMetric::Psi,
            threshold: MonitorThreshold::new(ThresholdOperator::Gt, 0.2),
            evaluation_window: "7d".to_string(),
        });
        assert_eq!(spec.monitor_type(), MonitorType::Drift);
        assert_eq!(spec.monitor_type().to_string(), "DRIFT");

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["monitor_type"], "DRIFT");
        assert_eq!(value["monitor_condition"]["evaluation_metric"], "PSI");
    }
}
