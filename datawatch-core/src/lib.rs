//! Monitor evaluation and alerting pipeline for ML dataset quality.
//!
//! Datawatch watches model datasets for data-quality degradation (empty
//! values, missing categorical values, new categorical values) and raises
//! deduplicated alerts when a configured threshold is breached, optionally
//! forwarding notifications to an external chat channel.
//!
//! # Architecture
//! - Store traits at the persistence seam; backends are injected, never
//!   global (`stores`)
//! - Metric sources bound to concrete datasets (`metrics`)
//! - One evaluator strategy per evaluation metric (`evaluators`)
//! - An orchestrating processor per scheduled pass (`processor`)
//! - Notification through a narrow transport contract (`notify`)
//!
//! Scheduling is external: one invocation of
//! [`processor::MonitorProcessor::process`] is one synchronous pass for one
//! monitor, with no internal concurrency or retries.

pub mod config;
pub mod error;
pub mod evaluators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod processor;
pub mod services;
pub mod stores;

// Re-export commonly used types
pub use config::{CollectionNames, StoreConfig};
pub use error::{DataWatchError, Result};
pub use logging::init_logging;
pub use models::{
    Alert, DataQualityCondition, DataQualityMetric, Dataset, DatasetType, Environment,
    Integration, IntegrationConfig, IntegrationKind, Monitor, MonitorIdentification,
    MonitorSeverity, MonitorSpec, MonitorThreshold, MonitorType, ThresholdOperator, Violation,
};
pub use notify::{IntegrationService, SlackTransport};
pub use processor::MonitorProcessor;
pub use services::MonitorService;
