//! Monitor lifecycle: creation, listing, deletion.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::Result;
use crate::error::DataWatchError;
use crate::metrics::window_duration;
use crate::models::{
    DataQualityCondition, Monitor, MonitorIdentification, MonitorSeverity, MonitorSpec,
};
use crate::stores::{MonitorQuery, MonitorStore};

/// Creates and manages monitor definitions.
///
/// Only the data-quality family is creatable; drift and performance monitors
/// are an extension point of the condition union, not of this service.
pub struct MonitorService {
    monitors: Arc<dyn MonitorStore>,
}

impl MonitorService {
    /// Creates the service over a monitor store.
    pub fn new(monitors: Arc<dyn MonitorStore>) -> Self {
        Self { monitors }
    }

    /// Creates and persists a data quality monitor.
    ///
    /// `last_run` starts unset and is first stamped by the initial
    /// processing pass.
    ///
    /// # Errors
    /// Returns a configuration error for an empty dimension set or an
    /// unparseable evaluation window.
    pub async fn create_data_quality_monitor(
        &self,
        monitor_name: impl Into<String>,
        identification: MonitorIdentification,
        condition: DataQualityCondition,
        severity: MonitorSeverity,
        integration_id: Option<Uuid>,
    ) -> Result<Monitor> {
        if condition.dimensions.features.is_empty() {
            return Err(DataWatchError::configuration(
                "Monitor dimensions must not be empty",
            ));
        }
        window_duration(&condition.evaluation_window)?;

        let monitor = Monitor {
            monitor_id: Uuid::new_v4(),
            monitor_name: monitor_name.into(),
            monitor_identification: identification,
            spec: MonitorSpec::DataQuality(condition),
            severity,
            integration_id,
            created_at: Utc::now(),
            last_run: None,
        };

        self.monitors.insert_monitor(monitor).await
    }

    /// Lists monitors matching the query, newest first.
    pub async fn list_monitors(&self, query: &MonitorQuery) -> Result<Vec<Monitor>> {
        self.monitors.find_monitors(query).await
    }

    /// Counts all monitors.
    pub async fn count_monitors(&self) -> Result<u64> {
        self.monitors.count_monitors().await
    }

    /// Deletes one monitor by id.
    pub async fn delete_monitor(&self, monitor_id: Uuid) -> Result<()> {
        self.monitors.delete_monitor(monitor_id).await
    }
}
