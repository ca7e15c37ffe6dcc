//! In-memory fakes for the executor and notifier seams (testing only)
//!
//! Provides `FakeSourceControl`, `FakePrHost`, scripted mutations and
//! recording notifiers that satisfy the trait contracts without touching git,
//! the network, or a hosting API.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::{AcquisitionKind, OnboardError, OnboardResult};
use crate::domain::outcome::RunResult;
use crate::domain::topic::TopicConfig;
use crate::mutation::{MutationReport, TopicMutation};
use crate::notify::Notifier;
use crate::scm::{PullRequestDraft, PullRequestHost, RepoTarget, SourceControl};

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Changed(String),
    Unchanged,
    Conflict(String),
    Fail(String),
    Panic(String),
}

/// Mutation with a fixed result, optionally delayed.
#[derive(Debug, Clone)]
pub struct FixedMutation {
    script: Script,
    delay: Option<Duration>,
    calls: Arc<AtomicU64>,
}

impl FixedMutation {
    fn scripted(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn changed(description: impl Into<String>) -> Self {
        Self::scripted(Script::Changed(description.into()))
    }

    pub fn unchanged() -> Self {
        Self::scripted(Script::Unchanged)
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::scripted(Script::Conflict(reason.into()))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::scripted(Script::Fail(reason.into()))
    }

    pub fn panicking(message: impl Into<String>) -> Self {
        Self::scripted(Script::Panic(message.into()))
    }

    /// Sleep before reporting, to force a completion order in tests.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicMutation for FixedMutation {
    async fn mutate(&self, _topic: &TopicConfig, _repo: &Path) -> OnboardResult<MutationReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Changed(d) => Ok(MutationReport::changed(d.clone())),
            Script::Unchanged => Ok(MutationReport::unchanged("nothing to do")),
            Script::Conflict(r) => Err(OnboardError::MutationConflict(r.clone())),
            Script::Fail(r) => Err(OnboardError::Mutation(r.clone())),
            Script::Panic(m) => panic!("{m}"),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeSourceControl
// ---------------------------------------------------------------------------

/// Source control that creates empty checkouts and records pushes.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    unreachable: HashSet<String>,
    acquired: Mutex<Vec<PathBuf>>,
    pushed: Mutex<Vec<String>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `acquire` fail with `NotFound` for `slug`.
    pub fn failing_acquire(mut self, slug: impl Into<String>) -> Self {
        self.unreachable.insert(slug.into());
        self
    }

    /// Checkout paths handed out so far.
    pub fn acquired(&self) -> Vec<PathBuf> {
        self.acquired.lock().unwrap().clone()
    }

    /// Branches pushed so far.
    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn acquire(&self, target: &RepoTarget, workspace: &Path) -> OnboardResult<PathBuf> {
        if self.unreachable.contains(&target.slug) {
            return Err(OnboardError::acquisition(
                &target.slug,
                AcquisitionKind::NotFound,
                "repository not found",
            ));
        }
        let checkout = workspace.join(target.dir_name());
        std::fs::create_dir_all(&checkout)?;
        self.acquired.lock().unwrap().push(checkout.clone());
        Ok(checkout)
    }

    async fn create_branch(&self, _repo: &Path, _branch: &str) -> OnboardResult<()> {
        Ok(())
    }

    async fn commit_and_push(&self, _repo: &Path, branch: &str, _message: &str) -> OnboardResult<()> {
        self.pushed.lock().unwrap().push(branch.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakePrHost
// ---------------------------------------------------------------------------

/// PR host returning `https://github.com/<repo>/pull/<n>` with a shared counter.
#[derive(Debug, Default)]
pub struct FakePrHost {
    failure: Option<String>,
    next: AtomicU64,
    drafts: Mutex<Vec<PullRequestDraft>>,
}

impl FakePrHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn drafts(&self) -> Vec<PullRequestDraft> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PullRequestHost for FakePrHost {
    async fn open_pr(&self, draft: &PullRequestDraft) -> OnboardResult<String> {
        if let Some(reason) = &self.failure {
            return Err(OnboardError::PullRequest {
                repo: draft.repo.clone(),
                reason: reason.clone(),
            });
        }
        self.drafts.lock().unwrap().push(draft.clone());
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://github.com/{}/pull/{n}", draft.repo))
    }
}

// ---------------------------------------------------------------------------
// Notifiers
// ---------------------------------------------------------------------------

/// Notifier that keeps every run it was handed.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    runs: Mutex<Vec<RunResult>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<RunResult> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, run: &RunResult, _topic: &TopicConfig) -> OnboardResult<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }
}

/// Notifier whose channel always answers with `status`.
#[derive(Debug)]
pub struct FailingNotifier {
    status: u16,
}

impl FailingNotifier {
    pub fn with_status(status: u16) -> Self {
        Self { status }
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _run: &RunResult, _topic: &TopicConfig) -> OnboardResult<()> {
        Err(OnboardError::Delivery {
            status: Some(self.status),
            reason: "channel rejected the message".to_string(),
        })
    }
}
