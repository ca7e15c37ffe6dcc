//! Network adapters for topicflow: GitHub PR creation and Slack delivery.

pub mod error;
pub mod github;
pub mod slack;

pub use error::{HostingError, HostingResult};
pub use github::{GitHubConfig, GitHubPrHost, DEFAULT_API_BASE, DEFAULT_CLONE_BASE};
pub use slack::{SlackConfig, SlackWebhookNotifier, DEFAULT_WEBHOOK_TIMEOUT};
