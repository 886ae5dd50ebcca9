//! Error types for the monitor evaluation and alerting pipeline.
//!
//! The taxonomy separates caller-fatal resolution errors (a missing dataset
//! aborts the whole processing pass) from contained delivery errors (a failed
//! notification never unwinds an alert that was already persisted).

use thiserror::Error;

/// Main error type for Datawatch operations.
#[derive(Debug, Error)]
pub enum DataWatchError {
    /// A referenced entity does not exist in the store.
    ///
    /// Fatal for the current processing pass: a monitor cannot be evaluated
    /// without its target dataset or integration.
    #[error("Entity not found: {entity} [{name}]")]
    EntityNotFound {
        /// Entity kind, e.g. `event_dataset`, `batch_dataset`, `integration`
        entity: String,
        /// Identifier that failed to resolve
        name: String,
    },

    /// An equivalent entity already exists in the store.
    #[error("Entity already exists: {name}: {message}")]
    EntityAlreadyExists {
        /// Entity kind or name
        name: String,
        /// Conflict detail
        message: String,
    },

    /// A threshold carried an operator token the comparator does not know.
    #[error("Unsupported threshold operator: {operator}")]
    UnsupportedOperator {
        /// The offending operator token
        operator: String,
    },

    /// A monitor was saved with a monitor type the pipeline cannot process.
    #[error("Unsupported monitor type: {monitor_type}")]
    UnsupportedMonitorType {
        /// The unprocessable monitor type
        monitor_type: String,
    },

    /// An integration is configured with a type no transport exists for.
    #[error("Unsupported integration type: {integration_type}")]
    UnsupportedIntegrationType {
        /// The configured integration type
        integration_type: String,
    },

    /// An outbound notification failed at the transport.
    ///
    /// Logged and contained by the processor; never unwinds the alert that
    /// triggered the notification.
    #[error("Integration {kind} failed: {message}")]
    Integration {
        /// Integration kind, e.g. `SLACK`
        kind: String,
        /// Transport error text
        message: String,
    },

    /// A document store operation failed.
    #[error("Store operation failed: {context}")]
    Store {
        /// What the pipeline was doing when the store call failed
        context: String,
        /// Underlying driver error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration or validation error.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Validation detail
        message: String,
    },
}

/// Convenience type alias for Results with `DataWatchError`.
pub type Result<T> = std::result::Result<T, DataWatchError>;

impl DataWatchError {
    /// Creates an entity-not-found error.
    pub fn entity_not_found(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            name: name.into(),
        }
    }

    /// Creates an entity-already-exists error.
    pub fn entity_already_exists(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EntityAlreadyExists {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an integration error from a transport failure.
    pub fn integration(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integration {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a store error with context.
    pub fn store_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
