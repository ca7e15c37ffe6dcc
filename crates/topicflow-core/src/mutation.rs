//! Mutation contract for per-repository file edits.
//!
//! A [`TopicMutation`] turns a checked-out repository into the state that
//! onboards the topic. It must be idempotent and must not touch the network:
//! running it twice on an unchanged checkout reports `changed = false` the
//! second time. How "already present" is detected is up to the implementation.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::domain::error::{OnboardError, OnboardResult};
use crate::domain::topic::TopicConfig;
use crate::git::{working_tree_changes, DEFAULT_COMMAND_TIMEOUT};

/// What a mutation did to the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    pub changed: bool,
    pub description: String,
}

impl MutationReport {
    pub fn changed(description: impl Into<String>) -> Self {
        Self {
            changed: true,
            description: description.into(),
        }
    }

    pub fn unchanged(description: impl Into<String>) -> Self {
        Self {
            changed: false,
            description: description.into(),
        }
    }
}

/// Applies the topic's configuration to one repository checkout.
///
/// Returning [`OnboardError::MutationConflict`] is equivalent to an unchanged
/// report: the executor records the step as skipped.
#[async_trait]
pub trait TopicMutation: Send + Sync {
    async fn mutate(&self, topic: &TopicConfig, repo: &Path) -> OnboardResult<MutationReport>;
}

/// Runs a shell command inside the checkout and reports whatever it changed.
///
/// The command template may use `{topic}`, `{value_type}`, `{sink_type}` and
/// `{table_name}`. A non-zero exit is a mutation failure; change detection is
/// `git status --porcelain` after the command finishes.
#[derive(Debug, Clone)]
pub struct CommandMutation {
    template: String,
    timeout: Duration,
}

impl CommandMutation {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command_line(&self, topic: &TopicConfig) -> String {
        topic.render(&self.template)
    }
}

#[async_trait]
impl TopicMutation for CommandMutation {
    async fn mutate(&self, topic: &TopicConfig, repo: &Path) -> OnboardResult<MutationReport> {
        let line = self.command_line(topic);
        if line.trim().is_empty() {
            return Err(OnboardError::Configuration(
                "mutation command is empty".to_string(),
            ));
        }

        debug!(command = %line, repo = %repo.display(), "running mutation command");
        let child = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                OnboardError::Mutation(format!(
                    "command timed out after {}s: {line}",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OnboardError::Mutation(format!(
                "command exited with {}: {stderr}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let changes = working_tree_changes(repo, self.timeout).await?;
        if changes.is_empty() {
            Ok(MutationReport::unchanged("no files changed"))
        } else {
            Ok(MutationReport::changed(format!(
                "{} file(s) changed: {}",
                changes.len(),
                changes.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::topic::{SinkType, ValueType};
    use std::process::Command as StdCommand;

    fn git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for args in [
            vec!["init"],
            vec!["-c", "user.name=t", "-c", "user.email=t@example.com", "commit", "--allow-empty", "-m", "initial"],
        ] {
            let out = StdCommand::new("git").args(&args).current_dir(dir.path()).output().unwrap();
            assert!(out.status.success());
        }
        dir
    }

    fn topic() -> TopicConfig {
        TopicConfig::new("customer.action.v1", ValueType::Json, SinkType::Realtime).unwrap()
    }

    #[test]
    fn test_command_line_renders_placeholders() {
        let m = CommandMutation::new("add-topic --topic {topic} --table {table_name} --sink {sink_type}");
        assert_eq!(
            m.command_line(&topic()),
            "add-topic --topic customer.action.v1 --table customer__action__v1__raw --sink realtime"
        );
    }

    #[tokio::test]
    async fn test_command_that_writes_reports_changed_then_unchanged() {
        let repo = git_repo();
        let m = CommandMutation::new("echo {topic} > topics.txt");

        let first = m.mutate(&topic(), repo.path()).await.unwrap();
        assert!(first.changed);
        assert!(first.description.contains("topics.txt"));

        // Commit the result so the checkout already contains the topic.
        let add = StdCommand::new("git").args(["add", "."]).current_dir(repo.path()).output().unwrap();
        assert!(add.status.success());
        let commit = StdCommand::new("git")
            .args(["-c", "user.name=t", "-c", "user.email=t@example.com", "commit", "-m", "seed"])
            .current_dir(repo.path())
            .output()
            .unwrap();
        assert!(commit.status.success());

        let second = m.mutate(&topic(), repo.path()).await.unwrap();
        assert!(!second.changed);
    }

    #[tokio::test]
    async fn test_failing_command_is_mutation_error() {
        let repo = git_repo();
        let m = CommandMutation::new("echo boom >&2; exit 3");
        let err = m.mutate(&topic(), repo.path()).await.unwrap_err();
        match err {
            OnboardError::Mutation(msg) => {
                assert!(msg.contains("3"));
                assert!(msg.contains("boom"));
            }
            other => panic!("expected mutation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let repo = git_repo();
        let m = CommandMutation::new("sleep 5").with_timeout(Duration::from_millis(100));
        let err = m.mutate(&topic(), repo.path()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
