//! Error taxonomy for topic onboarding.
//!
//! Run-level errors (`Validation`, `Configuration`, `Delivery`) reach the caller.
//! Everything else is captured into the owning step's outcome by the executor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a repository could not be obtained or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionKind {
    NotFound,
    Auth,
    Network,
    Other,
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AcquisitionKind::NotFound => "not found",
            AcquisitionKind::Auth => "authentication failed",
            AcquisitionKind::Network => "network failure",
            AcquisitionKind::Other => "unavailable",
        };
        f.write_str(s)
    }
}

/// Errors produced while onboarding a topic.
#[derive(Debug, thiserror::Error)]
pub enum OnboardError {
    /// Raw input is missing or malformed; the run aborts before dispatch.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Step catalog or sink type configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Repository or hosting API could not be reached.
    #[error("repository {repo} {kind}: {reason}")]
    Acquisition {
        repo: String,
        kind: AcquisitionKind,
        reason: String,
    },

    /// The desired change is already present in the repository.
    #[error("already configured: {0}")]
    MutationConflict(String),

    /// The mutation collaborator failed.
    #[error("mutation failed: {0}")]
    Mutation(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("pull request creation failed for {repo}: {reason}")]
    PullRequest { repo: String, reason: String },

    /// Notification could not be delivered. Already-created PRs stay valid.
    #[error("notification delivery failed{}: {reason}", http_status(.status))]
    Delivery { status: Option<u16>, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OnboardError {
    pub fn acquisition(
        repo: impl Into<String>,
        kind: AcquisitionKind,
        reason: impl Into<String>,
    ) -> Self {
        OnboardError::Acquisition {
            repo: repo.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// True for errors that abort the whole run rather than a single step.
    pub fn is_run_level(&self) -> bool {
        matches!(
            self,
            OnboardError::Validation(_) | OnboardError::Configuration(_) | OnboardError::Delivery { .. }
        )
    }
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Result type for onboarding operations.
pub type OnboardResult<T> = std::result::Result<T, OnboardError>;
