//! Slack incoming-webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use topicflow_core::{render_message, DagTrigger, Notifier, OnboardResult, RunResult, TopicConfig};

use crate::error::{truncate_body, HostingError, HostingResult};

pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

const TARGET: &str = "slack webhook";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub timeout: Duration,
}

impl SlackConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Posts the rendered run message to a Slack webhook.
pub struct SlackWebhookNotifier {
    config: SlackConfig,
    trigger: Option<DagTrigger>,
    client: reqwest::Client,
}

impl SlackWebhookNotifier {
    pub fn new(config: SlackConfig) -> HostingResult<Self> {
        if !config.webhook_url.starts_with("http://") && !config.webhook_url.starts_with("https://") {
            return Err(HostingError::Config(
                "Slack webhook URL must be an http(s) URL".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HostingError::http(TARGET, e))?;
        Ok(Self {
            config,
            trigger: None,
            client,
        })
    }

    /// Include the manual DAG trigger link when a realtime run unlocks it.
    pub fn with_trigger(mut self, trigger: Option<DagTrigger>) -> Self {
        self.trigger = trigger;
        self
    }

    /// POST `payload`; anything but a 2xx answer is an error.
    pub async fn post(&self, payload: &Value) -> HostingResult<()> {
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| HostingError::http(TARGET, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostingError::Status {
                target: TARGET.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body, 200),
            });
        }
        debug!(status = status.as_u16(), "slack webhook accepted message");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackWebhookNotifier {
    async fn notify(&self, run: &RunResult, topic: &TopicConfig) -> OnboardResult<()> {
        let payload = render_message(run, topic, self.trigger.as_ref());
        self.post(&payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        let err = SlackWebhookNotifier::new(SlackConfig::new("hooks.slack.com/services/x"))
            .err()
            .unwrap();
        assert!(matches!(err, HostingError::Config(_)));
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(SlackConfig::new("https://x").timeout, Duration::from_secs(10));
    }
}
