//! GitHub REST pull request host.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use topicflow_core::{OnboardResult, PullRequestDraft, PullRequestHost, RemoteLayout};

use crate::error::{truncate_body, HostingError, HostingResult};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_CLONE_BASE: &str = "https://github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub credentials and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub token: String,
    /// REST API root, e.g. `https://api.github.com`.
    pub api_base: String,
    /// Root for HTTPS clone URLs, e.g. `https://github.com`.
    pub clone_base: String,
}

impl GitHubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            clone_base: DEFAULT_CLONE_BASE.to_string(),
        }
    }

    /// Read `GITHUB_TOKEN`, with `GITHUB_API_URL` and `GITHUB_SERVER_URL`
    /// overriding the endpoints (both are set on GitHub Actions runners).
    pub fn from_env() -> HostingResult<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| HostingError::Config("GITHUB_TOKEN is not set".to_string()))?;
        let mut config = Self::new(token);
        if let Ok(api) = std::env::var("GITHUB_API_URL") {
            config.api_base = api;
        }
        if let Ok(server) = std::env::var("GITHUB_SERVER_URL") {
            config.clone_base = server;
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_clone_base(mut self, clone_base: impl Into<String>) -> Self {
        self.clone_base = clone_base.into();
        self
    }

    /// Token-authenticated HTTPS remotes for [`topicflow_core::GitCli`].
    pub fn remote_layout(&self) -> RemoteLayout {
        RemoteLayout::Https {
            base_url: self.clone_base.clone(),
            token: Some(self.token.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedPullRequest {
    html_url: String,
    number: u64,
}

/// Opens PRs through `POST /repos/{owner}/{repo}/pulls`.
pub struct GitHubPrHost {
    config: GitHubConfig,
    client: reqwest::Client,
}

impl GitHubPrHost {
    pub fn new(config: GitHubConfig) -> HostingResult<Self> {
        if config.token.trim().is_empty() {
            return Err(HostingError::Config("GitHub token must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("topicflow/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HostingError::http("github", e))?;
        Ok(Self { config, client })
    }

    fn pulls_url(&self, repo: &str) -> String {
        format!("{}/repos/{repo}/pulls", self.config.api_base.trim_end_matches('/'))
    }

    /// Create the PR and return its `html_url`.
    pub async fn create_pull_request(&self, draft: &PullRequestDraft) -> HostingResult<String> {
        let target = format!("github {}", draft.repo);
        debug!(repo = %draft.repo, head = %draft.head, base = %draft.base, "creating pull request");

        let response = self
            .client
            .post(self.pulls_url(&draft.repo))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&CreatePullRequest {
                title: &draft.title,
                head: &draft.head,
                base: &draft.base,
                body: &draft.body,
            })
            .send()
            .await
            .map_err(|e| HostingError::http(&target, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostingError::Status {
                target,
                status: status.as_u16(),
                body: truncate_body(&body, 500),
            });
        }

        let created: CreatedPullRequest = response.json().await.map_err(|e| {
            HostingError::InvalidResponse {
                target: target.clone(),
                reason: e.without_url().to_string(),
            }
        })?;
        info!(repo = %draft.repo, number = created.number, "pull request created");
        Ok(created.html_url)
    }
}

#[async_trait]
impl PullRequestHost for GitHubPrHost {
    async fn open_pr(&self, draft: &PullRequestDraft) -> OnboardResult<String> {
        self.create_pull_request(draft)
            .await
            .map_err(|e| e.into_pull_request(&draft.repo))
    }
}
