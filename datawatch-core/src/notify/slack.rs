//! Slack chat transport.

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::error::DataWatchError;

use super::NotificationTransport;

const CHAT_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Notification transport posting through the Slack Web API.
pub struct SlackTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl SlackTransport {
    /// Creates a transport against the public Slack API.
    pub fn new() -> Self {
        Self::with_endpoint(CHAT_POST_MESSAGE_URL)
    }

    /// Creates a transport against a custom `chat.postMessage` endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for SlackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationTransport for SlackTransport {
    async fn post_message(&self, channel: &str, token: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&message_payload(channel, text))
            .send()
            .await
            .map_err(|e| DataWatchError::integration("SLACK", e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| DataWatchError::integration("SLACK", e.to_string()))?;

        check_api_response(&body)
    }
}

fn message_payload(channel: &str, text: &str) -> Value {
    serde_json::json!({
        "channel": channel,
        "text": text,
    })
}

/// Maps the Slack API envelope onto the error taxonomy. Slack reports
/// failures as `{"ok": false, "error": "..."}` with HTTP 200.
fn check_api_response(body: &Value) -> Result<()> {
    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        Ok(())
    } else {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        Err(DataWatchError::integration("SLACK", reason))
    }
}
