//! Per-step outcomes and the aggregated run result.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::topic::{SinkType, TopicConfig};

/// Terminal status of one dispatched step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one dispatched step. `detail` carries the PR URL on success and
/// the reason otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub title: String,
    pub status: StepStatus,
    pub detail: String,
    /// Branch created for the change, if the step got that far.
    pub branch: Option<String>,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn success(step: &str, title: &str, pr_url: impl Into<String>) -> Self {
        Self::with_status(step, title, StepStatus::Success, pr_url)
    }

    pub fn skipped(step: &str, title: &str, reason: impl Into<String>) -> Self {
        Self::with_status(step, title, StepStatus::Skipped, reason)
    }

    pub fn failed(step: &str, title: &str, reason: impl Into<String>) -> Self {
        Self::with_status(step, title, StepStatus::Failed, reason)
    }

    fn with_status(step: &str, title: &str, status: StepStatus, detail: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            title: title.to_string(),
            status,
            detail: detail.into(),
            branch: None,
            duration_ms: 0,
        }
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn took(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// PR URL, only ever present for successful steps.
    pub fn pr_url(&self) -> Option<&str> {
        (self.status == StepStatus::Success).then_some(self.detail.as_str())
    }

    /// Trailing path segment of the PR URL (the PR number on GitHub).
    pub fn pr_number(&self) -> Option<&str> {
        self.pr_url()
            .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
            .filter(|n| !n.is_empty())
    }
}

/// A defined step the selector did not dispatch for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedStep {
    pub step: String,
    pub title: String,
    pub reason: String,
}

/// Counts derived from a run's outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} PRs created ({} skipped, {} failed)",
            self.succeeded, self.total, self.skipped, self.failed
        )
    }
}

/// Aggregated result of one run. Outcomes are in step declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub topic: String,
    pub table_name: String,
    pub sink_type: SinkType,
    pub outcomes: Vec<StepOutcome>,
    pub excluded: Vec<ExcludedStep>,
    /// A dispatched step that gates the manual downstream trigger succeeded.
    #[serde(default)]
    pub manual_trigger_unlocked: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn new(run_id: Uuid, topic: &TopicConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            topic: topic.topic().to_string(),
            table_name: topic.table_name().to_string(),
            sink_type: topic.sink_type(),
            outcomes: Vec::new(),
            excluded: Vec::new(),
            manual_trigger_unlocked: false,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn summary(&self) -> RunSummary {
        let count = |status: StepStatus| self.outcomes.iter().filter(|o| o.status == status).count();
        RunSummary {
            succeeded: count(StepStatus::Success),
            skipped: count(StepStatus::Skipped),
            failed: count(StepStatus::Failed),
            total: self.outcomes.len(),
        }
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step == step)
    }

    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.status == StepStatus::Success)
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.status == StepStatus::Failed)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}
