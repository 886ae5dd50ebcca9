//! In-memory store backends.
//!
//! `MemoryBackend` implements every store trait over plain vectors guarded by
//! a mutex. It backs the test suite and is handy for local development; the
//! production backend is [`super::mongo::MongoBackend`]. `RecordingTransport`
//! plays the same role for the notification transport.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;
use crate::error::DataWatchError;
use crate::metrics::{EmptyValueStats, window_duration};
use crate::models::{
    Alert, Dataset, DatasetRow, Integration, IntegrationConfig, Monitor, UniqueValueSet,
};
use crate::notify::NotificationTransport;

use super::{
    AlertDedupQuery, AlertStore, DatasetQuery, DatasetStore, IntegrationStore, MonitorQuery,
    MonitorStore, RowCollection, RowStore,
};

#[derive(Default)]
struct Collections {
    monitors: Vec<Monitor>,
    alerts: Vec<Alert>,
    datasets: Vec<Dataset>,
    integrations: Vec<Integration>,
    event_rows: Vec<DatasetRow>,
    batch_rows: Vec<DatasetRow>,
}

/// In-memory implementation of all store traits.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Collections>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seeds dataset records.
    pub fn seed_datasets(&self, datasets: Vec<Dataset>) {
        self.lock().datasets.extend(datasets);
    }

    /// Seeds production rows.
    pub fn seed_event_rows(&self, rows: Vec<DatasetRow>) {
        self.lock().event_rows.extend(rows);
    }

    /// Seeds reference rows.
    pub fn seed_batch_rows(&self, rows: Vec<DatasetRow>) {
        self.lock().batch_rows.extend(rows);
    }

    /// Snapshot of every persisted alert, in insertion order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().alerts.clone()
    }

    fn rows_in_window(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        window: &str,
    ) -> Result<Vec<DatasetRow>> {
        let since = Utc::now() - window_duration(window)?;
        let inner = self.lock();
        let rows = match collection {
            RowCollection::EventRows => &inner.event_rows,
            RowCollection::BatchRows => &inner.batch_rows,
        };
        Ok(rows
            .iter()
            .filter(|row| row.dataset_id == dataset_id && row.created_at >= since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DatasetStore for MemoryBackend {
    async fn find_datasets(&self, query: &DatasetQuery) -> Result<Vec<Dataset>> {
        let mut datasets: Vec<Dataset> = self
            .lock()
            .datasets
            .iter()
            .filter(|d| {
                d.model_version_id == query.model_version_id
                    && d.dataset_type == query.dataset_type
            })
            .cloned()
            .collect();
        datasets.sort_by_key(|d| d.created_at);
        Ok(datasets)
    }
}

#[async_trait]
impl AlertStore for MemoryBackend {
    async fn insert_alert(&self, alert: Alert) -> Result<Alert> {
        self.lock().alerts.push(alert.clone());
        Ok(alert)
    }

    #[allow(clippy::float_cmp)]
    async fn count_matching(&self, query: &AlertDedupQuery) -> Result<u64> {
        let count = self
            .lock()
            .alerts
            .iter()
            .filter(|alert| {
                alert.alert_identification.model_version_id == query.model_version_id
                    && alert.violation.field == query.field
                    && alert.violation.focal_time_window == query.focal_time_window
                    && alert.violation.max_threshold == query.max_threshold
            })
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl MonitorStore for MemoryBackend {
    async fn insert_monitor(&self, monitor: Monitor) -> Result<Monitor> {
        self.lock().monitors.push(monitor.clone());
        Ok(monitor)
    }

    async fn get_monitor(&self, monitor_id: Uuid) -> Result<Monitor> {
        self.lock()
            .monitors
            .iter()
            .find(|m| m.monitor_id == monitor_id)
            .cloned()
            .ok_or_else(|| DataWatchError::entity_not_found("monitor", monitor_id.to_string()))
    }

    async fn find_monitors(&self, query: &MonitorQuery) -> Result<Vec<Monitor>> {
        let mut monitors: Vec<Monitor> = self
            .lock()
            .monitors
            .iter()
            .filter(|m| {
                query
                    .model_id
                    .is_none_or(|id| m.monitor_identification.model_id == id)
                    && query
                        .model_version_id
                        .is_none_or(|id| m.monitor_identification.model_version_id == id)
            })
            .cloned()
            .collect();
        monitors.sort_by_key(|m| std::cmp::Reverse(m.created_at));
        Ok(monitors)
    }

    async fn count_monitors(&self) -> Result<u64> {
        Ok(self.lock().monitors.len() as u64)
    }

    async fn delete_monitor(&self, monitor_id: Uuid) -> Result<()> {
        self.lock().monitors.retain(|m| m.monitor_id != monitor_id);
        Ok(())
    }

    async fn update_last_run(&self, monitor_id: Uuid, last_run: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        let monitor = inner
            .monitors
            .iter_mut()
            .find(|m| m.monitor_id == monitor_id)
            .ok_or_else(|| DataWatchError::entity_not_found("monitor", monitor_id.to_string()))?;
        monitor.last_run = Some(last_run);
        Ok(())
    }
}

#[async_trait]
impl IntegrationStore for MemoryBackend {
    async fn insert_integration(&self, integration: Integration) -> Result<Integration> {
        self.lock().integrations.push(integration.clone());
        Ok(integration)
    }

    async fn get_integration(&self, integration_id: Uuid) -> Result<Integration> {
        self.lock()
            .integrations
            .iter()
            .find(|i| i.integration_id == integration_id)
            .cloned()
            .ok_or_else(|| {
                DataWatchError::entity_not_found("integration", integration_id.to_string())
            })
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        Ok(self.lock().integrations.clone())
    }

    async fn delete_integration(&self, integration_id: Uuid) -> Result<()> {
        self.lock()
            .integrations
            .retain(|i| i.integration_id != integration_id);
        Ok(())
    }

    async fn find_by_configuration(
        &self,
        configuration: &IntegrationConfig,
    ) -> Result<Option<Integration>> {
        Ok(self
            .lock()
            .integrations
            .iter()
            .find(|i| &i.configuration == configuration)
            .cloned())
    }
}

#[async_trait]
impl RowStore for MemoryBackend {
    async fn empty_value_counts(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, EmptyValueStats>> {
        let rows = self.rows_in_window(collection, dataset_id, window)?;
        let mut result = HashMap::new();

        for dimension in dimensions {
            let mut total = 0u64;
            let mut empty = 0u64;
            for row in &rows {
                for column in &row.columns {
                    if &column.name == dimension {
                        total += 1;
                        if column.value.as_deref().is_none_or(str::is_empty) {
                            empty += 1;
                        }
                    }
                }
            }
            if total > 0 {
                result.insert(dimension.clone(), EmptyValueStats::from_counts(empty, total));
            }
        }

        Ok(result)
    }

    async fn unique_values(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, UniqueValueSet>> {
        let rows = self.rows_in_window(collection, dataset_id, window)?;
        let mut result: HashMap<String, UniqueValueSet> = HashMap::new();

        for row in &rows {
            for column in &row.columns {
                if !dimensions.contains(&column.name) {
                    continue;
                }
                if let Some(value) = column.value.as_deref()
                    && !value.is_empty()
                {
                    result
                        .entry(column.name.clone())
                        .or_default()
                        .insert(value.to_string());
                }
            }
        }

        Ok(result)
    }
}

/// A posted chat message captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    /// Target channel
    pub channel: String,
    /// Auth token the message was posted with
    pub token: String,
    /// Message body
    pub text: String,
}

/// Notification transport fake that records messages instead of sending
/// them, with an optional injected failure.
#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<PostedMessage>>,
    failure: Mutex<Option<String>>,
}

impl RecordingTransport {
    /// Creates a transport that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent post fail with the given transport error text.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self
            .failure
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(message.into());
    }

    /// Snapshot of the messages posted so far.
    pub fn messages(&self) -> Vec<PostedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn post_message(&self, channel: &str, token: &str, text: &str) -> Result<()> {
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        if let Some(message) = failure {
            return Err(DataWatchError::integration("SLACK", message));
        }
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(PostedMessage {
                channel: channel.to_string(),
                token: token.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }
}
