//! Runs one step end to end: acquire, branch, mutate, commit, push, open PR.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::error::{OnboardError, OnboardResult};
use crate::domain::outcome::StepOutcome;
use crate::domain::topic::TopicConfig;
use crate::scm::{PullRequestDraft, PullRequestHost, RepositorySet, SourceControl};
use crate::steps::StepDefinition;

/// How far a step got before it stopped.
enum Completion {
    Opened(String),
    Unchanged(String),
}

/// Executes steps against exclusive temporary workspaces.
///
/// Every call gets its own directory under the workspace root, removed when
/// the call returns, so concurrent executions never share a checkout.
pub struct StepExecutor {
    scm: Arc<dyn SourceControl>,
    pr_host: Arc<dyn PullRequestHost>,
    repos: RepositorySet,
    workspace_root: Option<PathBuf>,
}

impl StepExecutor {
    pub fn new(
        scm: Arc<dyn SourceControl>,
        pr_host: Arc<dyn PullRequestHost>,
        repos: RepositorySet,
    ) -> Self {
        Self {
            scm,
            pr_host,
            repos,
            workspace_root: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp directory.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn repositories(&self) -> &RepositorySet {
        &self.repos
    }

    /// Run `step` for `topic`. Never returns an error: every failure becomes
    /// a `failed` outcome carrying the error text.
    pub async fn execute(&self, topic: &TopicConfig, step: &StepDefinition, run_stamp: &str) -> StepOutcome {
        let started = Instant::now();
        let branch = step.branch_name(topic, run_stamp);
        let mut pushed = false;

        let outcome = match self.attempt(topic, step, &branch, &mut pushed).await {
            Ok(Completion::Opened(url)) => {
                info!(step = step.id(), pr_url = %url, "pull request opened");
                StepOutcome::success(step.id(), step.title(), url).on_branch(&branch)
            }
            Ok(Completion::Unchanged(description)) => {
                info!(step = step.id(), %description, "no changes, skipping");
                StepOutcome::skipped(step.id(), step.title(), format!("{} ({description})", step.noop_hint()))
            }
            Err(OnboardError::MutationConflict(reason)) => {
                info!(step = step.id(), %reason, "already configured, skipping");
                StepOutcome::skipped(step.id(), step.title(), format!("{} ({reason})", step.noop_hint()))
            }
            Err(e) => {
                warn!(step = step.id(), error = %e, "step failed");
                let failed = StepOutcome::failed(step.id(), step.title(), e.to_string());
                if pushed {
                    failed.on_branch(&branch)
                } else {
                    failed
                }
            }
        };

        outcome.took(started.elapsed().as_millis() as u64)
    }

    async fn attempt(
        &self,
        topic: &TopicConfig,
        step: &StepDefinition,
        branch: &str,
        pushed: &mut bool,
    ) -> OnboardResult<Completion> {
        let target = self.repos.target(step.repository());

        let prefix = format!("topicflow-{}-", step.id());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let workspace = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        debug!(step = step.id(), repo = %target.slug, base = %target.base_branch, "acquiring repository");
        let checkout = self.scm.acquire(target, workspace.path()).await?;
        self.scm.create_branch(&checkout, branch).await?;

        let report = step.mutation().mutate(topic, &checkout).await?;
        if !report.changed {
            return Ok(Completion::Unchanged(report.description));
        }
        debug!(step = step.id(), changes = %report.description, "mutation applied");

        let change = step.change().render(topic);
        self.scm.commit_and_push(&checkout, branch, &change.commit_message).await?;
        *pushed = true;

        let url = self
            .pr_host
            .open_pr(&PullRequestDraft {
                repo: target.slug.clone(),
                head: branch.to_string(),
                base: target.base_branch.clone(),
                title: change.pr_title,
                body: change.pr_body,
            })
            .await?;
        Ok(Completion::Opened(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::StepStatus;
    use crate::domain::topic::{SinkType, ValueType};
    use crate::fakes::{FakePrHost, FakeSourceControl, FixedMutation};
    use crate::scm::RepoRole;
    use crate::steps::ChangeTemplate;

    fn topic() -> TopicConfig {
        TopicConfig::new("customer.action.v1", ValueType::Json, SinkType::Realtime).unwrap()
    }

    fn step(mutation: FixedMutation) -> StepDefinition {
        StepDefinition::new(
            "helm-apps",
            "Helm",
            RepoRole::HelmApps,
            [SinkType::Realtime],
            ChangeTemplate {
                commit_message: "Add Kafka topic: {topic}".to_string(),
                pr_title: "Add Kafka topic: {topic}".to_string(),
                pr_body: "Table {table_name}".to_string(),
            },
            Arc::new(mutation),
        )
        .unwrap()
        .with_branch_prefix("add-snowflake-sink")
        .with_noop_hint("Topic might already be configured.")
    }

    fn repos() -> RepositorySet {
        RepositorySet::with_default_branches("org/helm-apps", "org/data-airflow", "org/dbt")
    }

    #[tokio::test]
    async fn test_changed_mutation_opens_pr() {
        let scm = Arc::new(FakeSourceControl::new());
        let host = Arc::new(FakePrHost::new());
        let executor = StepExecutor::new(scm.clone(), host.clone(), repos());

        let outcome = executor
            .execute(&topic(), &step(FixedMutation::changed("values.yaml")), "s1")
            .await;

        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.pr_url(), Some("https://github.com/org/helm-apps/pull/1"));
        assert_eq!(outcome.branch.as_deref(), Some("add-snowflake-sink-customer-action-v1-s1"));

        let drafts = host.drafts();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].base, "master");
        assert_eq!(drafts[0].title, "Add Kafka topic: customer.action.v1");
        assert_eq!(drafts[0].body, "Table customer__action__v1__raw");
        assert_eq!(scm.pushed(), vec!["add-snowflake-sink-customer-action-v1-s1".to_string()]);
    }

    #[tokio::test]
    async fn test_unchanged_mutation_is_skipped_without_pr() {
        let scm = Arc::new(FakeSourceControl::new());
        let host = Arc::new(FakePrHost::new());
        let executor = StepExecutor::new(scm.clone(), host.clone(), repos());

        let outcome = executor.execute(&topic(), &step(FixedMutation::unchanged()), "s1").await;

        assert_eq!(outcome.status, StepStatus::Skipped);
        assert_eq!(outcome.detail, "Topic might already be configured. (nothing to do)");
        assert_eq!(outcome.pr_url(), None);
        assert!(host.drafts().is_empty());
        assert!(scm.pushed().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_is_skipped_with_reason() {
        let executor = StepExecutor::new(
            Arc::new(FakeSourceControl::new()),
            Arc::new(FakePrHost::new()),
            repos(),
        );
        let outcome = executor
            .execute(&topic(), &step(FixedMutation::conflict("topic listed twice")), "s1")
            .await;
        assert_eq!(outcome.status, StepStatus::Skipped);
        assert!(outcome.detail.contains("topic listed twice"));
    }

    #[tokio::test]
    async fn test_acquisition_failure_is_failed_outcome() {
        let scm = Arc::new(FakeSourceControl::new().failing_acquire("org/helm-apps"));
        let host = Arc::new(FakePrHost::new());
        let executor = StepExecutor::new(scm, host.clone(), repos());

        let outcome = executor.execute(&topic(), &step(FixedMutation::changed("x")), "s1").await;

        assert_eq!(outcome.status, StepStatus::Failed);
        assert!(outcome.detail.contains("org/helm-apps"));
        assert_eq!(outcome.branch, None);
        assert!(host.drafts().is_empty());
    }

    #[tokio::test]
    async fn test_pr_failure_keeps_pushed_branch() {
        let executor = StepExecutor::new(
            Arc::new(FakeSourceControl::new()),
            Arc::new(FakePrHost::new().failing("422 Validation Failed")),
            repos(),
        );
        let outcome = executor.execute(&topic(), &step(FixedMutation::changed("x")), "s1").await;
        assert_eq!(outcome.status, StepStatus::Failed);
        assert!(outcome.detail.contains("422"));
        assert_eq!(outcome.branch.as_deref(), Some("add-snowflake-sink-customer-action-v1-s1"));
    }

    #[tokio::test]
    async fn test_workspace_is_removed_after_step() {
        let root = tempfile::tempdir().unwrap();
        let executor = StepExecutor::new(
            Arc::new(FakeSourceControl::new()),
            Arc::new(FakePrHost::new()),
            repos(),
        )
        .with_workspace_root(root.path());

        executor.execute(&topic(), &step(FixedMutation::changed("x")), "s1").await;

        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
