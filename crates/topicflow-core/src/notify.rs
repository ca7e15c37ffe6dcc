//! Run notification: the [`Notifier`] seam and the message renderer.
//!
//! [`render_message`] builds a Slack Block Kit payload from nothing but the run
//! result, the topic and the optional trigger endpoint, so the same inputs
//! always produce the same JSON. Delivery lives in the hosting crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::error::OnboardResult;
use crate::domain::outcome::{RunResult, StepStatus};
use crate::domain::topic::{SinkType, TopicConfig};

/// Delivers a finished run to a team channel.
///
/// Implementations report a channel rejection as
/// [`crate::OnboardError::Delivery`]. PRs already opened stay valid.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, run: &RunResult, topic: &TopicConfig) -> OnboardResult<()>;
}

/// Airflow endpoint for the manual DAG trigger link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagTrigger {
    pub airflow_url: String,
    pub dag_id: String,
}

impl DagTrigger {
    pub fn new(airflow_url: impl Into<String>, dag_id: impl Into<String>) -> Self {
        Self {
            airflow_url: airflow_url.into(),
            dag_id: dag_id.into(),
        }
    }

    /// Both parts must be set; blank values yield `None`.
    pub fn from_parts(airflow_url: Option<String>, dag_id: Option<String>) -> Option<Self> {
        match (airflow_url, dag_id) {
            (Some(url), Some(dag)) if !url.trim().is_empty() && !dag.trim().is_empty() => {
                Some(Self::new(url, dag))
            }
            _ => None,
        }
    }

    pub fn trigger_url(&self) -> String {
        format!(
            "{}/dags/{}/trigger",
            self.airflow_url.trim_end_matches('/'),
            self.dag_id
        )
    }
}

fn section(text: String) -> Value {
    json!({ "type": "section", "text": { "type": "mrkdwn", "text": text } })
}

fn divider() -> Value {
    json!({ "type": "divider" })
}

/// Whether the trigger section belongs in the message.
pub fn shows_manual_trigger(run: &RunResult, topic: &TopicConfig, trigger: Option<&DagTrigger>) -> bool {
    trigger.is_some() && topic.sink_type() == SinkType::Realtime && run.manual_trigger_unlocked
}

/// Render the webhook payload for `run`.
pub fn render_message(run: &RunResult, topic: &TopicConfig, trigger: Option<&DagTrigger>) -> Value {
    let header = if run.all_succeeded() {
        format!("🎉 All PRs Created for Topic: {}", topic.topic())
    } else {
        let summary = run.summary();
        format!(
            "⚠️ {}/{} PRs Created for Topic: {}",
            summary.succeeded,
            summary.total,
            topic.topic()
        )
    };

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": header, "emoji": true }
        }),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Topic:*\n`{}`", topic.topic()) },
                { "type": "mrkdwn", "text": format!("*Table:*\n`{}`", topic.table_name()) }
            ]
        }),
        divider(),
    ];

    for outcome in &run.outcomes {
        let line = match outcome.status {
            StepStatus::Success => match outcome.pr_number() {
                Some(n) => format!("<{}|View PR #{n}> ✅", outcome.detail),
                None => format!("<{}|View PR> ✅", outcome.detail),
            },
            StepStatus::Skipped => format!("⚠️ {}", outcome.detail),
            StepStatus::Failed => format!("❌ {}", outcome.detail),
        };
        blocks.push(section(format!("*{}*\n{line}", outcome.title)));
    }

    if !run.excluded.is_empty() {
        let elements: Vec<Value> = run
            .excluded
            .iter()
            .map(|e| json!({ "type": "mrkdwn", "text": format!("⏭️ {}: {}", e.title, e.reason) }))
            .collect();
        blocks.push(json!({ "type": "context", "elements": elements }));
    }

    blocks.push(divider());

    if let Some(trigger) = trigger.filter(|_| shows_manual_trigger(run, topic, trigger)) {
        blocks.push(section(
            "*📋 Next Steps:*\n1. Review and merge the PRs above\n\
             2. Manually trigger the Airflow DAG to process the new table"
                .to_string(),
        ));
        blocks.push(section(format!(
            "🚀 *<{}|Click here to trigger DAG: {}>*\n\n*Table to process:* `{}`",
            trigger.trigger_url(),
            trigger.dag_id,
            topic.table_name()
        )));
        blocks.push(divider());
    }

    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": "👆 Click the links above to review and approve each PR in GitHub"
        }]
    }));

    json!({
        "text": format!("PRs created for topic: {}", topic.topic()),
        "blocks": blocks,
    })
}

/// Notifier that only logs the run summary. Used when no webhook is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, run: &RunResult, topic: &TopicConfig) -> OnboardResult<()> {
        info!(
            event = "notification.logged",
            topic = topic.topic(),
            summary = %run.summary(),
            "no notification channel configured"
        );
        Ok(())
    }
}
