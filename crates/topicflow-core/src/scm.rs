//! Source-control and PR-host seams used by the step executor.
//!
//! [`SourceControl`] covers clone, branch, commit and push against a local
//! workspace; [`PullRequestHost`] opens the PR. Both are injectable so the
//! executor can run against real git ([`crate::git::GitCli`]), a hosting API,
//! or the in-memory fakes in [`crate::fakes`].

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{OnboardError, OnboardResult};

/// Which pipeline repository a step writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoRole {
    /// Kafka Connect sink connector values.
    HelmApps,
    /// Streaming load DAGs.
    DataAirflow,
    /// Warehouse models and external sources.
    Dbt,
}

impl RepoRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoRole::HelmApps => "helm-apps",
            RepoRole::DataAirflow => "data-airflow",
            RepoRole::Dbt => "dbt",
        }
    }
}

impl fmt::Display for RepoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hosted repository and the branch PRs are opened against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
    /// `org/name` slug.
    pub slug: String,
    pub base_branch: String,
}

impl RepoTarget {
    pub fn new(slug: impl Into<String>, base_branch: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            base_branch: base_branch.into(),
        }
    }

    /// Last path segment of the slug, used as the checkout directory name.
    pub fn dir_name(&self) -> &str {
        self.slug.rsplit('/').next().unwrap_or(&self.slug)
    }
}

/// Configured target for every repository role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySet {
    pub helm_apps: RepoTarget,
    pub data_airflow: RepoTarget,
    pub dbt: RepoTarget,
}

impl RepositorySet {
    /// Targets with the conventional base branches: master, develop, master.
    pub fn with_default_branches(
        helm_apps: impl Into<String>,
        data_airflow: impl Into<String>,
        dbt: impl Into<String>,
    ) -> Self {
        Self {
            helm_apps: RepoTarget::new(helm_apps, "master"),
            data_airflow: RepoTarget::new(data_airflow, "develop"),
            dbt: RepoTarget::new(dbt, "master"),
        }
    }

    pub fn target(&self, role: RepoRole) -> &RepoTarget {
        match role {
            RepoRole::HelmApps => &self.helm_apps,
            RepoRole::DataAirflow => &self.data_airflow,
            RepoRole::Dbt => &self.dbt,
        }
    }

    /// Every slug must look like `org/name` and every base branch must be set.
    pub fn validate(&self) -> OnboardResult<()> {
        for role in [RepoRole::HelmApps, RepoRole::DataAirflow, RepoRole::Dbt] {
            let target = self.target(role);
            let parts: Vec<&str> = target.slug.split('/').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
                return Err(OnboardError::Configuration(format!(
                    "{role} repository '{}' must be of the form org/name",
                    target.slug
                )));
            }
            if target.base_branch.trim().is_empty() {
                return Err(OnboardError::Configuration(format!(
                    "{role} base branch must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Author recorded on onboarding commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "github-actions[bot]".to_string(),
            email: "github-actions[bot]@users.noreply.github.com".to_string(),
        }
    }
}

/// Clone, branch and publish operations on an exclusive local workspace.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Obtain a checkout of `target` at its base branch inside `workspace`.
    ///
    /// Fails with [`OnboardError::Acquisition`] when the repository cannot be
    /// reached, does not exist, or rejects the credentials.
    async fn acquire(&self, target: &RepoTarget, workspace: &Path) -> OnboardResult<PathBuf>;

    /// Create and switch to `branch` in the checkout.
    async fn create_branch(&self, repo: &Path, branch: &str) -> OnboardResult<()>;

    /// Stage everything, commit with `message`, and push `branch` to the remote.
    async fn commit_and_push(&self, repo: &Path, branch: &str, message: &str) -> OnboardResult<()>;
}

/// A pull request ready to be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDraft {
    pub repo: String,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

/// Opens pull requests on the hosting service.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Open the PR and return its web URL.
    async fn open_pr(&self, draft: &PullRequestDraft) -> OnboardResult<String>;
}
