//! End-to-end processing-pass scenarios over the in-memory backend.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use datawatch_core::error::DataWatchError;
use datawatch_core::models::{
    DataQualityCondition, DataQualityMetric, Dataset, DatasetRow, DatasetType, DriftCondition,
    DriftMetric, Environment, IntegrationConfig, IntegrationKind, Monitor, MonitorDimensions,
    MonitorIdentification, MonitorSeverity, MonitorSpec, MonitorThreshold, RowColumn,
    ThresholdOperator,
};
use datawatch_core::notify::{IntegrationService, NotificationTransport};
use datawatch_core::processor::MonitorProcessor;
use datawatch_core::stores::memory::{MemoryBackend, RecordingTransport};
use datawatch_core::stores::{
    AlertStore, DatasetStore, IntegrationStore, MonitorStore, RowStore,
};

struct Fixture {
    backend: Arc<MemoryBackend>,
    transport: Arc<RecordingTransport>,
    identification: MonitorIdentification,
}

impl Fixture {
    fn new() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
            transport: Arc::new(RecordingTransport::new()),
            identification: MonitorIdentification {
                model_id: Uuid::new_v4(),
                model_version_id: Uuid::new_v4(),
            },
        }
    }

    fn dataset(&self, dataset_type: DatasetType) -> Dataset {
        let dataset = Dataset {
            dataset_id: Uuid::new_v4(),
            dataset_name: format!("{dataset_type}-dataset"),
            dataset_type,
            environment: match dataset_type {
                DatasetType::Event => Environment::Production,
                DatasetType::Batch => Environment::Training,
            },
            model_id: self.identification.model_id,
            model_version_id: self.identification.model_version_id,
            created_at: Utc::now(),
        };
        self.backend.seed_datasets(vec![dataset.clone()]);
        dataset
    }

    fn seed_rows(&self, dataset: &Dataset, values: &[(&str, Option<&str>)]) {
        let rows: Vec<DatasetRow> = values
            .iter()
            .map(|(name, value)| DatasetRow {
                row_id: Uuid::new_v4(),
                dataset_id: dataset.dataset_id,
                created_at: Utc::now(),
                columns: vec![RowColumn {
                    name: (*name).to_string(),
                    value: value.map(ToString::to_string),
                }],
            })
            .collect();
        match dataset.dataset_type {
            DatasetType::Event => self.backend.seed_event_rows(rows),
            DatasetType::Batch => self.backend.seed_batch_rows(rows),
        }
    }

    /// Seeds `empty` empty and `present` non-empty event rows for `feature`.
    fn seed_percentage(&self, dataset: &Dataset, feature: &str, empty: usize, present: usize) {
        let mut values = Vec::new();
        for _ in 0..empty {
            values.push((feature, None));
        }
        for _ in 0..present {
            values.push((feature, Some("ok")));
        }
        self.seed_rows(dataset, &values);
    }

    async fn monitor(
        &self,
        spec: MonitorSpec,
        integration_id: Option<Uuid>,
    ) -> Monitor {
        let monitor = Monitor {
            monitor_id: Uuid::new_v4(),
            monitor_name: "M1".to_string(),
            monitor_identification: self.identification,
            spec,
            severity: MonitorSeverity::Low,
            integration_id,
            created_at: Utc::now(),
            last_run: None,
        };
        self.backend.insert_monitor(monitor.clone()).await.unwrap();
        monitor
    }

    fn processor(&self, monitor: Monitor) -> MonitorProcessor {
        let integrations = Arc::new(IntegrationService::new(
            Arc::clone(&self.backend) as Arc<dyn IntegrationStore>,
            Arc::clone(&self.transport) as Arc<dyn NotificationTransport>,
        ));
        MonitorProcessor::new(
            monitor,
            Arc::clone(&self.backend) as Arc<dyn DatasetStore>,
            Arc::clone(&self.backend) as Arc<dyn AlertStore>,
            Arc::clone(&self.backend) as Arc<dyn MonitorStore>,
            Arc::clone(&self.backend) as Arc<dyn RowStore>,
            integrations,
        )
    }

    async fn slack_integration(&self) -> Uuid {
        let integration = datawatch_core::models::Integration {
            integration_id: Uuid::new_v4(),
            integration: IntegrationKind::Monitoring,
            app_name: "alerts".to_string(),
            configuration: IntegrationConfig::Slack {
                channel: "#ml-alerts".to_string(),
                token: "xoxb-test".to_string(),
            },
        };
        self.backend
            .insert_integration(integration.clone())
            .await
            .unwrap();
        integration.integration_id
    }
}

fn empty_value_spec(operator: ThresholdOperator, value: f64, features: &[&str]) -> MonitorSpec {
    MonitorSpec::DataQuality(DataQualityCondition {
        evaluation_metric: DataQualityMetric::EmptyValue,
        threshold: MonitorThreshold::new(operator, value),
        dimensions: MonitorDimensions::new(features.iter().copied()),
        evaluation_window: "24h".to_string(),
    })
}

fn missing_value_spec(features: &[&str]) -> MonitorSpec {
    MonitorSpec::DataQuality(DataQualityCondition {
        evaluation_metric: DataQualityMetric::MissingValue,
        threshold: MonitorThreshold::new(ThresholdOperator::Gt, 0.0),
        dimensions: MonitorDimensions::new(features.iter().copied()),
        evaluation_window: "24h".to_string(),
    })
}

#[tokio::test]
async fn test_empty_value_pass_raises_one_alert() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    // f1 at 11% empty against a gt-10 threshold; f2 never observed.
    fixture.seed_percentage(&event, "f1", 11, 89);

    let monitor = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1", "f2"]), None)
        .await;
    let violations = fixture.processor(monitor).process().await.unwrap();

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].dimension, "f1");
    assert!((violations[0].metric_value - 11.0).abs() < 1e-9);

    let alerts = fixture.backend.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].violation.field, "f1");
    assert!((alerts[0].violation.focal_value - 11.0).abs() < 1e-9);
    assert_eq!(alerts[0].violation.focal_time_window, "24h");
    assert_eq!(
        alerts[0].alert_identification.model_version_id,
        fixture.identification.model_version_id
    );
}

#[tokio::test]
async fn test_second_pass_suppresses_duplicate_alert() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_percentage(&event, "f1", 11, 89);

    let monitor = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1"]), None)
        .await;

    let first = fixture.processor(monitor.clone()).process().await.unwrap();
    let second = fixture.processor(monitor).process().await.unwrap();

    // Raw violations are not deduplicated; the alert store is.
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(fixture.backend.alerts().len(), 1);
}

#[tokio::test]
async fn test_distinct_threshold_is_not_deduplicated() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_percentage(&event, "f1", 11, 89);

    let gt10 = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1"]), None)
        .await;
    fixture.processor(gt10).process().await.unwrap();

    // Same dimension and window, tighter threshold: a different dedup key.
    let gt5 = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 5.0, &["f1"]), None)
        .await;
    fixture.processor(gt5).process().await.unwrap();

    assert_eq!(fixture.backend.alerts().len(), 2);
}

#[tokio::test]
async fn test_last_run_advances_without_violations() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_percentage(&event, "f1", 0, 100);

    let monitor = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1"]), None)
        .await;
    let monitor_id = monitor.monitor_id;

    let before = Utc::now();
    let violations = fixture.processor(monitor).process().await.unwrap();
    assert!(violations.is_empty());

    let stored = fixture.backend.get_monitor(monitor_id).await.unwrap();
    let last_run = stored.last_run.expect("last_run must be stamped");
    assert!(last_run >= before);

    // A second pass advances the marker again.
    let again = fixture.backend.get_monitor(monitor_id).await.unwrap();
    fixture.processor(again).process().await.unwrap();
    let stored = fixture.backend.get_monitor(monitor_id).await.unwrap();
    assert!(stored.last_run.expect("last_run must be stamped") >= last_run);
}

#[tokio::test]
async fn test_missing_event_dataset_aborts_pass() {
    let fixture = Fixture::new();
    // No event dataset seeded for this model version.

    let monitor = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1"]), None)
        .await;
    let monitor_id = monitor.monitor_id;

    let result = fixture.processor(monitor).process().await;

    match result {
        Err(DataWatchError::EntityNotFound { entity, name }) => {
            assert_eq!(entity, "event_dataset");
            assert_eq!(name, fixture.identification.model_version_id.to_string());
        }
        other => panic!("expected EntityNotFound, got {other:?}"),
    }

    // The pass aborted before touching the alert store or the run marker.
    assert!(fixture.backend.alerts().is_empty());
    let stored = fixture.backend.get_monitor(monitor_id).await.unwrap();
    assert!(stored.last_run.is_none());
}

#[tokio::test]
async fn test_missing_batch_dataset_aborts_missing_value_pass() {
    let fixture = Fixture::new();
    fixture.dataset(DatasetType::Event);

    let monitor = fixture.monitor(missing_value_spec(&["f1"]), None).await;
    let result = fixture.processor(monitor).process().await;

    match result {
        Err(DataWatchError::EntityNotFound { entity, .. }) => {
            assert_eq!(entity, "batch_dataset");
        }
        other => panic!("expected EntityNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_value_pass_flags_dropped_category() {
    let fixture = Fixture::new();
    let batch = fixture.dataset(DatasetType::Batch);
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_rows(&batch, &[("f1", Some("a")), ("f1", Some("b"))]);
    fixture.seed_rows(&event, &[("f1", Some("a"))]);

    let monitor = fixture.monitor(missing_value_spec(&["f1"]), None).await;
    let violations = fixture.processor(monitor).process().await.unwrap();

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].dimension, "f1");
    assert!((violations[0].metric_value - 1.0).abs() < f64::EPSILON);
    assert_eq!(fixture.backend.alerts().len(), 1);
}

#[tokio::test]
async fn test_new_value_pass_flags_unseen_category() {
    let fixture = Fixture::new();
    let batch = fixture.dataset(DatasetType::Batch);
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_rows(&batch, &[("f1", Some("a"))]);
    fixture.seed_rows(&event, &[("f1", Some("a")), ("f1", Some("z"))]);

    let spec = MonitorSpec::DataQuality(DataQualityCondition {
        evaluation_metric: DataQualityMetric::NewValue,
        threshold: MonitorThreshold::new(ThresholdOperator::Gt, 0.0),
        dimensions: MonitorDimensions::new(["f1"]),
        evaluation_window: "24h".to_string(),
    });
    let monitor = fixture.monitor(spec, None).await;
    let violations = fixture.processor(monitor).process().await.unwrap();

    assert_eq!(violations.len(), 1);
    assert!((violations[0].metric_value - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_notification_dispatched_for_new_alert() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_percentage(&event, "f1", 11, 89);
    let integration_id = fixture.slack_integration().await;

    let monitor = fixture
        .monitor(
            empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1"]),
            Some(integration_id),
        )
        .await;
    fixture.processor(monitor.clone()).process().await.unwrap();

    let messages = fixture.transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel, "#ml-alerts");
    assert!(messages[0].text.contains("*f1*"));

    // A suppressed duplicate triggers no second notification.
    fixture.processor(monitor).process().await.unwrap();
    assert_eq!(fixture.transport.messages().len(), 1);
}

#[tokio::test]
async fn test_transport_failure_keeps_alert_persisted() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_percentage(&event, "f1", 11, 89);
    let integration_id = fixture.slack_integration().await;
    fixture.transport.fail_with("connection reset");

    let monitor = fixture
        .monitor(
            empty_value_spec(ThresholdOperator::Gt, 10.0, &["f1"]),
            Some(integration_id),
        )
        .await;
    let monitor_id = monitor.monitor_id;

    // The pass itself succeeds; the delivery failure is contained.
    let violations = fixture.processor(monitor).process().await.unwrap();
    assert_eq!(violations.len(), 1);

    assert_eq!(fixture.backend.alerts().len(), 1);
    assert!(fixture.transport.messages().is_empty());

    // last_run still stamped despite the failed notification.
    let stored = fixture.backend.get_monitor(monitor_id).await.unwrap();
    assert!(stored.last_run.is_some());
}

#[tokio::test]
async fn test_violations_follow_dimension_order() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    fixture.seed_percentage(&event, "f2", 20, 80);
    fixture.seed_percentage(&event, "f1", 30, 70);

    let monitor = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gt, 10.0, &["f2", "f1"]), None)
        .await;
    let violations = fixture.processor(monitor).process().await.unwrap();

    // Emission order is the configured dimension order, not row order.
    let dimensions: Vec<&str> = violations.iter().map(|v| v.dimension.as_str()).collect();
    assert_eq!(dimensions, ["f2", "f1"]);

    let alerts = fixture.backend.alerts();
    assert_eq!(alerts[0].violation.field, "f2");
    assert_eq!(alerts[1].violation.field, "f1");
}

#[tokio::test]
async fn test_unsupported_monitor_type_fails_fast() {
    let fixture = Fixture::new();
    fixture.dataset(DatasetType::Event);

    let spec = MonitorSpec::Drift(DriftCondition {
        evaluation_metric: DriftMetric::Psi,
        threshold: MonitorThreshold::new(ThresholdOperator::Gt, 0.2),
        evaluation_window: "7d".to_string(),
    });
    let monitor = fixture.monitor(spec, None).await;
    let monitor_id = monitor.monitor_id;

    let result = fixture.processor(monitor).process().await;

    match result {
        Err(DataWatchError::UnsupportedMonitorType { monitor_type }) => {
            assert_eq!(monitor_type, "DRIFT");
        }
        other => panic!("expected UnsupportedMonitorType, got {other:?}"),
    }

    let stored = fixture.backend.get_monitor(monitor_id).await.unwrap();
    assert!(stored.last_run.is_none());
}

#[tokio::test]
async fn test_boundary_threshold_gte_alerts_on_equality() {
    let fixture = Fixture::new();
    let event = fixture.dataset(DatasetType::Event);
    // Exactly 10% empty.
    fixture.seed_percentage(&event, "f1", 10, 90);

    let monitor = fixture
        .monitor(empty_value_spec(ThresholdOperator::Gte, 10.0, &["f1"]), None)
        .await;
    let violations = fixture.processor(monitor).process().await.unwrap();

    assert_eq!(violations.len(), 1);
    assert!((violations[0].metric_value - 10.0).abs() < 1e-9);
}
