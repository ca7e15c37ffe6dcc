//! Concurrent dispatch of the active steps and aggregation into a [`RunResult`].
//!
//! Every active step runs in its own task on a [`JoinSet`]. Task bodies are
//! wrapped in `catch_unwind`, so a panicking step becomes a `failed` outcome
//! like any other error and siblings keep running. Results land in slots
//! indexed by declaration order, never completion order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::domain::error::OnboardResult;
use crate::domain::outcome::{ExcludedStep, RunResult, StepOutcome, StepStatus};
use crate::domain::topic::{RawTopicInput, SinkType, TopicConfig};
use crate::executor::StepExecutor;
use crate::notify::Notifier;
use crate::obs;
use crate::scm::RepositorySet;
use crate::steps::StepCatalog;

/// A step the run would dispatch, as shown by `plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step: String,
    pub title: String,
    pub repo: String,
    pub base_branch: String,
    pub branch: String,
}

/// What a run would do, computed without touching any repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    pub topic: String,
    pub table_name: String,
    pub sink_type: SinkType,
    pub steps: Vec<PlannedStep>,
    pub excluded: Vec<ExcludedStep>,
}

/// Branch suffix for run `run_id` started at `at`, e.g. `20261018t101500-1a2b3c4d`.
///
/// The run id prefix keeps two runs started in the same second apart.
pub fn run_stamp(at: DateTime<Utc>, run_id: &Uuid) -> String {
    let id = run_id.simple().to_string();
    format!("{}-{}", at.format("%Y%m%dt%H%M%S"), &id[..8])
}

/// The steps `topic` would dispatch and the ones it would leave out.
pub fn plan_run(catalog: &StepCatalog, repos: &RepositorySet, topic: &TopicConfig, stamp: &str) -> RunPlan {
    let steps = catalog
        .select(topic.sink_type())
        .into_iter()
        .map(|step| {
            let target = repos.target(step.repository());
            PlannedStep {
                step: step.id().to_string(),
                title: step.title().to_string(),
                repo: target.slug.clone(),
                base_branch: target.base_branch.clone(),
                branch: step.branch_name(topic, stamp),
            }
        })
        .collect();
    RunPlan {
        topic: topic.topic().to_string(),
        table_name: topic.table_name().to_string(),
        sink_type: topic.sink_type(),
        steps,
        excluded: catalog.exclusions(topic.sink_type()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct Orchestrator {
    catalog: Arc<StepCatalog>,
    executor: Arc<StepExecutor>,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(catalog: StepCatalog, executor: StepExecutor, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            executor: Arc::new(executor),
            notifier,
        }
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    /// Validate `raw`, dispatch, then notify.
    ///
    /// Invalid input fails with [`crate::OnboardError::Validation`] before any
    /// step starts. A delivery failure is returned after every step has
    /// settled; the outcomes are already in the logs at that point.
    pub async fn run(&self, raw: &RawTopicInput) -> OnboardResult<RunResult> {
        let topic = TopicConfig::resolve(raw)?;
        let run = self.execute(&topic).await;
        self.notify(&run, &topic).await?;
        Ok(run)
    }

    /// Hand `run` to the notifier, logging the delivery result.
    pub async fn notify(&self, run: &RunResult, topic: &TopicConfig) -> OnboardResult<()> {
        let run_id = run.run_id.to_string();
        match self.notifier.notify(run, topic).await {
            Ok(()) => {
                obs::emit_notification_sent(&run_id);
                Ok(())
            }
            Err(e) => {
                obs::emit_notification_failed(&run_id, &e);
                Err(e)
            }
        }
    }

    /// See [`plan_run`].
    pub fn plan(&self, topic: &TopicConfig, stamp: &str) -> RunPlan {
        plan_run(&self.catalog, self.executor.repositories(), topic, stamp)
    }

    /// Dispatch every active step concurrently and aggregate, without notifying.
    pub async fn execute(&self, topic: &TopicConfig) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = obs::run_span(&run_id.to_string(), topic.topic());
        self.dispatch(run_id, topic).instrument(span).await
    }

    async fn dispatch(&self, run_id: Uuid, topic: &TopicConfig) -> RunResult {
        let run_key = run_id.to_string();
        let started_at = Utc::now();
        let stamp = run_stamp(started_at, &run_id);

        let selected: Vec<_> = self
            .catalog
            .select(topic.sink_type())
            .into_iter()
            .cloned()
            .collect();
        let mut run = RunResult::new(run_id, topic, started_at);
        run.excluded = self.catalog.exclusions(topic.sink_type());

        obs::emit_run_started(
            &run_key,
            topic.topic(),
            topic.sink_type().as_str(),
            selected.len(),
            run.excluded.len(),
        );

        let mut join_set = JoinSet::new();
        for (idx, step) in selected.iter().cloned().enumerate() {
            let executor = Arc::clone(&self.executor);
            let topic = topic.clone();
            let stamp = stamp.clone();
            obs::emit_step_dispatched(
                &run_key,
                step.id(),
                &executor.repositories().target(step.repository()).slug,
                &step.branch_name(&topic, &stamp),
            );
            let span = obs::step_span(step.id());
            join_set.spawn(
                async move {
                    let outcome = AssertUnwindSafe(executor.execute(&topic, &step, &stamp))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            StepOutcome::failed(
                                step.id(),
                                step.title(),
                                format!("step panicked: {}", panic_message(payload.as_ref())),
                            )
                        });
                    (idx, outcome)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<StepOutcome>> = vec![None; selected.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    obs::emit_step_finished(&run_key, &outcome);
                    slots[idx] = Some(outcome);
                }
                Err(e) => warn!(run_id = %run_key, error = %e, "step task did not complete"),
            }
        }

        run.outcomes = selected
            .iter()
            .zip(slots)
            .map(|(step, slot)| {
                slot.unwrap_or_else(|| {
                    StepOutcome::failed(step.id(), step.title(), "step task did not complete")
                })
            })
            .collect();

        run.manual_trigger_unlocked = selected.iter().zip(&run.outcomes).any(|(step, outcome)| {
            step.unlocks_manual_trigger() && outcome.status == StepStatus::Success
        });
        run.finished_at = Utc::now();

        obs::emit_run_finished(&run_key, run.duration_ms(), &run.summary());
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_stamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 10, 15, 0).unwrap();
        let run_id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        assert_eq!(run_stamp(at, &run_id), "20261018t101500-1a2b3c4d");
    }

    #[test]
    fn test_runs_in_the_same_second_get_distinct_stamps() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 10, 15, 0).unwrap();
        assert_ne!(run_stamp(at, &Uuid::new_v4()), run_stamp(at, &Uuid::new_v4()));
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
