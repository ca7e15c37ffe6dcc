//! Step definitions: one declarative unit of repository mutation.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::domain::error::{OnboardError, OnboardResult};
use crate::domain::topic::{SinkType, TopicConfig};
use crate::mutation::TopicMutation;
use crate::scm::RepoRole;

/// Commit and PR text for a step. Templates use the placeholders understood by
/// [`TopicConfig::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeTemplate {
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

/// Rendered commit and PR text for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChange {
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

impl ChangeTemplate {
    pub fn render(&self, topic: &TopicConfig) -> RenderedChange {
        RenderedChange {
            commit_message: topic.render(&self.commit_message),
            pr_title: topic.render(&self.pr_title),
            pr_body: topic.render(&self.pr_body),
        }
    }
}

/// Static description of one step. Never mutated after the catalog is built.
#[derive(Clone)]
pub struct StepDefinition {
    id: String,
    title: String,
    repository: RepoRole,
    applicability: BTreeSet<SinkType>,
    enabled: bool,
    disabled_reason: Option<String>,
    branch_prefix: String,
    noop_hint: String,
    unlocks_manual_trigger: bool,
    change: ChangeTemplate,
    mutation: Arc<dyn TopicMutation>,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("repository", &self.repository)
            .field("applicability", &self.applicability)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    /// Fails with [`OnboardError::Configuration`] when `applicability` is empty
    /// or the id is blank.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        repository: RepoRole,
        applicability: impl IntoIterator<Item = SinkType>,
        change: ChangeTemplate,
        mutation: Arc<dyn TopicMutation>,
    ) -> OnboardResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(OnboardError::Configuration("step id must not be empty".to_string()));
        }
        let applicability: BTreeSet<SinkType> = applicability.into_iter().collect();
        if applicability.is_empty() {
            return Err(OnboardError::Configuration(format!(
                "step '{id}' must apply to at least one sink type"
            )));
        }
        Ok(Self {
            branch_prefix: id.clone(),
            id,
            title: title.into(),
            repository,
            applicability,
            enabled: true,
            disabled_reason: None,
            noop_hint: "No changes detected.".to_string(),
            unlocks_manual_trigger: false,
            change,
            mutation,
        })
    }

    pub fn with_branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.branch_prefix = prefix.into();
        self
    }

    pub fn with_noop_hint(mut self, hint: impl Into<String>) -> Self {
        self.noop_hint = hint.into();
        self
    }

    /// Mark this step as the one whose success makes the manual downstream
    /// trigger meaningful.
    pub fn unlocking_manual_trigger(mut self) -> Self {
        self.unlocks_manual_trigger = true;
        self
    }

    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.enabled = false;
        self.disabled_reason = Some(reason.into());
        self
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self.disabled_reason = None;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn repository(&self) -> RepoRole {
        self.repository
    }

    pub fn applicability(&self) -> &BTreeSet<SinkType> {
        &self.applicability
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    pub fn applies_to(&self, sink: SinkType) -> bool {
        self.applicability.contains(&sink)
    }

    /// Applicable and enabled.
    pub fn is_active_for(&self, sink: SinkType) -> bool {
        self.enabled && self.applies_to(sink)
    }

    pub fn noop_hint(&self) -> &str {
        &self.noop_hint
    }

    pub fn unlocks_manual_trigger(&self) -> bool {
        self.unlocks_manual_trigger
    }

    pub fn change(&self) -> &ChangeTemplate {
        &self.change
    }

    pub fn mutation(&self) -> &Arc<dyn TopicMutation> {
        &self.mutation
    }

    /// `<prefix>-<topic slug>-<run stamp>`; the stamp keeps repeated runs
    /// for the same topic from colliding on the remote.
    pub fn branch_name(&self, topic: &TopicConfig, run_stamp: &str) -> String {
        if run_stamp.is_empty() {
            format!("{}-{}", self.branch_prefix, topic.slug())
        } else {
            format!("{}-{}-{}", self.branch_prefix, topic.slug(), run_stamp)
        }
    }
}
