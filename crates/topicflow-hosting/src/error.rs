//! Errors from the hosting API and webhook clients.

use topicflow_core::OnboardError;

#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport failure; the URL is stripped so webhook secrets stay out of logs.
    #[error("request to {target} failed: {source}")]
    Http {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{target} returned HTTP {status}: {body}")]
    Status {
        target: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {target}: {reason}")]
    InvalidResponse { target: String, reason: String },
}

pub type HostingResult<T> = std::result::Result<T, HostingError>;

impl HostingError {
    pub(crate) fn http(target: impl Into<String>, source: reqwest::Error) -> Self {
        HostingError::Http {
            target: target.into(),
            source: source.without_url(),
        }
    }

    /// HTTP status the remote answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HostingError::Status { status, .. } => Some(*status),
            HostingError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Attribute the failure to the step that was opening a PR on `repo`.
    pub fn into_pull_request(self, repo: &str) -> OnboardError {
        match self {
            HostingError::Config(reason) => OnboardError::Configuration(reason),
            other => OnboardError::PullRequest {
                repo: repo.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Webhook and API failures outside a step surface as delivery errors.
impl From<HostingError> for OnboardError {
    fn from(err: HostingError) -> Self {
        match err {
            HostingError::Config(reason) => OnboardError::Configuration(reason),
            other => OnboardError::Delivery {
                status: other.status(),
                reason: other.to_string(),
            },
        }
    }
}

/// Cut `body` to at most `max` characters for error messages.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
