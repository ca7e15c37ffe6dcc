//! topicflow core: onboard a Kafka topic across the pipeline repositories.
//!
//! A run resolves a [`TopicConfig`], selects the active steps from a
//! [`StepCatalog`], executes them concurrently with per-step failure isolation
//! and hands the ordered [`RunResult`] to a [`Notifier`].

pub mod domain;
pub mod executor;
pub mod fakes;
pub mod git;
pub mod mutation;
pub mod notify;
pub mod obs;
pub mod orchestrator;
pub mod scm;
pub mod steps;
pub mod telemetry;

pub use domain::{
    derive_table_name, AcquisitionKind, ExcludedStep, OnboardError, OnboardResult, RawTopicInput,
    RunResult, RunSummary, SinkType, StepOutcome, StepStatus, TopicConfig, ValueType,
    RAW_TABLE_SUFFIX,
};
pub use executor::StepExecutor;
pub use git::{GitCli, RemoteLayout, DEFAULT_COMMAND_TIMEOUT};
pub use mutation::{CommandMutation, MutationReport, TopicMutation};
pub use notify::{render_message, DagTrigger, Notifier, TracingNotifier};
pub use orchestrator::{plan_run, run_stamp, Orchestrator, PlannedStep, RunPlan};
pub use scm::{
    CommitIdentity, PullRequestDraft, PullRequestHost, RepoRole, RepoTarget, RepositorySet,
    SourceControl,
};
pub use steps::{StandardMutations, StepCatalog, StepDefinition};
pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
