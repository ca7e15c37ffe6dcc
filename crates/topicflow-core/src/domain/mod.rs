//! Domain types: topic configuration, outcomes, and the error taxonomy.

pub mod error;
pub mod outcome;
pub mod topic;

pub use error::{AcquisitionKind, OnboardError, OnboardResult};
pub use outcome::{ExcludedStep, RunResult, RunSummary, StepOutcome, StepStatus};
pub use topic::{derive_table_name, RawTopicInput, SinkType, TopicConfig, ValueType, RAW_TABLE_SUFFIX};
