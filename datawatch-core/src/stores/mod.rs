//! Store traits for the pipeline's external collaborators.
//!
//! The document-store engine is an external collaborator: the pipeline only
//! depends on these narrow, object-safe contracts. The production backend is
//! [`mongo::MongoBackend`]; [`memory::MemoryBackend`] serves tests and local
//! development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;
use crate::metrics::EmptyValueStats;
use crate::models::{
    Alert, Dataset, DatasetType, Integration, IntegrationConfig, Monitor, UniqueValueSet,
};

pub mod memory;
pub mod mongo;

/// Filter for dataset lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetQuery {
    /// Model version the dataset must belong to
    pub model_version_id: Uuid,
    /// Required dataset kind
    pub dataset_type: DatasetType,
}

/// Alert deduplication key.
///
/// An identical still-active violation is recognized by these four fields;
/// a match suppresses re-alerting.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDedupQuery {
    /// Model version scope
    pub model_version_id: Uuid,
    /// Breaching feature dimension
    pub field: String,
    /// Evaluation window label
    pub focal_time_window: String,
    /// Breached threshold value
    pub max_threshold: f64,
}

/// Filter for monitor listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorQuery {
    /// Restrict to monitors bound to this model
    pub model_id: Option<Uuid>,
    /// Restrict to monitors bound to this model version
    pub model_version_id: Option<Uuid>,
}

/// Raw-row collection a metric is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCollection {
    /// Production / streaming rows
    EventRows,
    /// Reference rows
    BatchRows,
}

/// Read access to persisted datasets.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Finds datasets matching the query, ordered by `created_at` ascending
    /// (insertion order). Returns an empty list on no match.
    async fn find_datasets(&self, query: &DatasetQuery) -> Result<Vec<Dataset>>;
}

/// Append-only access to raised alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persists a new alert. The caller supplies the id; the store assigns
    /// nothing further.
    async fn insert_alert(&self, alert: Alert) -> Result<Alert>;

    /// Counts alerts matching the deduplication key.
    ///
    /// This read-then-write check is the pipeline's only dedup mechanism:
    /// two concurrent passes for the same monitor can both observe zero and
    /// both insert. The contract is eventual, not linearizable, consistency.
    async fn count_matching(&self, query: &AlertDedupQuery) -> Result<u64>;
}

/// Access to monitor definitions and their run bookkeeping.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Persists a new monitor.
    async fn insert_monitor(&self, monitor: Monitor) -> Result<Monitor>;

    /// Fetches one monitor by id.
    ///
    /// # Errors
    /// `EntityNotFound` with entity `monitor` when absent.
    async fn get_monitor(&self, monitor_id: Uuid) -> Result<Monitor>;

    /// Finds monitors matching the query, newest first.
    async fn find_monitors(&self, query: &MonitorQuery) -> Result<Vec<Monitor>>;

    /// Counts all monitors.
    async fn count_monitors(&self) -> Result<u64>;

    /// Deletes one monitor by id.
    async fn delete_monitor(&self, monitor_id: Uuid) -> Result<()>;

    /// Advances the monitor's `last_run` marker.
    async fn update_last_run(&self, monitor_id: Uuid, last_run: DateTime<Utc>) -> Result<()>;
}

/// Access to notification integrations.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Persists a new integration.
    async fn insert_integration(&self, integration: Integration) -> Result<Integration>;

    /// Fetches one integration by id.
    ///
    /// # Errors
    /// `EntityNotFound` with entity `integration` when absent.
    async fn get_integration(&self, integration_id: Uuid) -> Result<Integration>;

    /// Lists all integrations.
    async fn list_integrations(&self) -> Result<Vec<Integration>>;

    /// Deletes one integration by id.
    async fn delete_integration(&self, integration_id: Uuid) -> Result<()>;

    /// Finds an integration with an identical configuration, if any.
    async fn find_by_configuration(
        &self,
        configuration: &IntegrationConfig,
    ) -> Result<Option<Integration>>;
}

/// Read-only aggregation over raw dataset rows.
///
/// Both operations return zeroed stats / empty sets for a dataset with no
/// matching rows; a brand-new dataset never fails evaluation.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Per-dimension empty-value counts over rows of the dataset within the
    /// lookback window.
    async fn empty_value_counts(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, EmptyValueStats>>;

    /// Per-dimension distinct value sets over rows of the dataset within the
    /// lookback window. Empty values do not contribute.
    async fn unique_values(
        &self,
        collection: RowCollection,
        dataset_id: Uuid,
        dimensions: &[String],
        window: &str,
    ) -> Result<HashMap<String, UniqueValueSet>>;
}
