//! Alert notification: integration management and outbound delivery.
//!
//! `IntegrationService` owns the integration records and renders the
//! human-readable alert descriptions; the actual delivery goes through the
//! narrow [`NotificationTransport`] contract so the chat client stays an
//! external collaborator.

mod slack;

pub use slack::SlackTransport;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;
use crate::error::DataWatchError;
use crate::models::{
    Alert, DataQualityCondition, DataQualityMetric, Integration, IntegrationConfig,
    IntegrationKind,
};
use crate::stores::IntegrationStore;

/// Outbound chat transport.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Posts one message. A failure is surfaced immediately as an
    /// integration error; there is no internal retry loop.
    async fn post_message(&self, channel: &str, token: &str, text: &str) -> Result<()>;
}

/// Manages notification integrations and dispatches alert notifications.
pub struct IntegrationService {
    store: Arc<dyn IntegrationStore>,
    transport: Arc<dyn NotificationTransport>,
}

impl IntegrationService {
    /// Creates the service over an integration store and a transport.
    pub fn new(store: Arc<dyn IntegrationStore>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self { store, transport }
    }

    /// Registers a new integration.
    ///
    /// A monitoring integration gets a greeting message posted through the
    /// transport so a misconfigured channel fails at registration time, not
    /// at the first alert.
    ///
    /// # Errors
    /// `EntityAlreadyExists` when an integration with an identical
    /// configuration exists; `UnsupportedIntegrationType` for a monitoring
    /// integration no transport exists for.
    pub async fn add_integration(
        &self,
        kind: IntegrationKind,
        app_name: impl Into<String>,
        configuration: IntegrationConfig,
    ) -> Result<Integration> {
        if self.store.find_by_configuration(&configuration).await?.is_some() {
            return Err(DataWatchError::entity_already_exists(
                "Integration",
                "Integration already exists",
            ));
        }

        if kind == IntegrationKind::Monitoring {
            match &configuration {
                IntegrationConfig::Slack { channel, token } => {
                    self.transport
                        .post_message(channel, token, "Datawatch connected to this channel")
                        .await?;
                }
                other => {
                    return Err(DataWatchError::UnsupportedIntegrationType {
                        integration_type: other.type_name().to_string(),
                    });
                }
            }
        }

        self.store
            .insert_integration(Integration {
                integration_id: Uuid::new_v4(),
                integration: kind,
                app_name: app_name.into(),
                configuration,
            })
            .await
    }

    /// Fetches one integration by id.
    pub async fn get_integration(&self, integration_id: Uuid) -> Result<Integration> {
        self.store.get_integration(integration_id).await
    }

    /// Lists all integrations.
    pub async fn list_integrations(&self) -> Result<Vec<Integration>> {
        self.store.list_integrations().await
    }

    /// Deletes one integration by id.
    pub async fn delete_integration(&self, integration_id: Uuid) -> Result<()> {
        self.store.delete_integration(integration_id).await
    }

    /// Renders and dispatches the notification for a newly created alert.
    ///
    /// # Errors
    /// `EntityNotFound` when the integration id does not resolve;
    /// `UnsupportedIntegrationType` for a configured type no transport
    /// exists for; `Integration` for a transport failure. None of these
    /// unwind the alert that triggered the notification; the processor
    /// logs and continues.
    pub async fn send_alert(
        &self,
        alert: &Alert,
        condition: &DataQualityCondition,
        integration_id: Uuid,
    ) -> Result<()> {
        let integration = self.get_integration(integration_id).await?;
        match &integration.configuration {
            IntegrationConfig::Slack { channel, token } => {
                let description = alert_description(alert, condition);
                self.transport.post_message(channel, token, &description).await
            }
            other => Err(DataWatchError::UnsupportedIntegrationType {
                integration_type: other.type_name().to_string(),
            }),
        }
    }
}

/// Renders the fixed human-readable description of an alert.
pub fn alert_description(alert: &Alert, condition: &DataQualityCondition) -> String {
    let violation = &alert.violation;
    let (anomaly, causes) = match condition.evaluation_metric {
        DataQualityMetric::EmptyValue => (
            "An anomaly in the ratio of empty values".to_string(),
            "Empty data can have a significant effect on model behavior and may lead to \
             unexpected results.\nEmpty data might occur because:\n\
             - Serving environment fault\n\
             - Data store / provider schema changes\n\
             - Changes in internal API\n\
             - Changes in model subject input",
        ),
        DataQualityMetric::MissingValue => (
            "Categorical values from the baseline are missing in production".to_string(),
            "Missing categories can have a significant effect on model behavior and may \
             lead to unexpected results.\nCategories might go missing because:\n\
             - Upstream filtering or segmentation changes\n\
             - Data store / provider schema changes\n\
             - Changes in internal API",
        ),
        DataQualityMetric::NewValue => (
            "Categorical values unseen in the baseline appeared in production".to_string(),
            "New categories can have a significant effect on model behavior and may lead \
             to unexpected results.\nNew categories might appear because:\n\
             - Upstream producers introduced new codes\n\
             - Data store / provider schema changes\n\
             - Changes in model subject input",
        ),
    };

    format!(
        "{anomaly} of feature *{field}*.\n\
         The anomaly was observed in the *{model}* model, in version *{model_version}* \
         for the last *{window}*.\n\
         Based on the defined limits, the value was expected to stay {operator} \
         *{threshold}*, but *{observed}* was received.\n\
         {causes}",
        field = violation.field,
        model = alert.model_id,
        model_version = violation.model_version_id,
        window = violation.focal_time_window,
        operator = threshold_expectation(condition),
        threshold = violation.max_threshold,
        observed = violation.focal_value,
    )
}

/// Phrase for the side of the threshold the value was expected to stay on.
fn threshold_expectation(condition: &DataQualityCondition) -> &'static str {
    use crate::models::ThresholdOperator;
    match condition.threshold.operator {
        ThresholdOperator::Gt => "at or below",
        ThresholdOperator::Gte => "below",
        ThresholdOperator::Lt => "at or above",
        ThresholdOperator::Lte => "above",
        ThresholdOperator::Eq => "away from",
    }
}
