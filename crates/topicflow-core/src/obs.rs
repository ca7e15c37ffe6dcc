//! Structured lifecycle events for onboarding runs.
//!
//! Every emitter logs one line with an `event` field so runs can be followed
//! in JSON logs: `run.started`, `step.dispatched`, `step.finished`,
//! `run.finished`, `notification.sent` and `notification.failed`.

use tracing::{info, warn, Span};

use crate::domain::outcome::{RunSummary, StepOutcome};

/// Span covering one run. Attach with `tracing::Instrument`.
pub fn run_span(run_id: &str, topic: &str) -> Span {
    tracing::info_span!("topicflow.run", run_id = %run_id, topic = %topic)
}

/// Span covering one step task inside a run.
pub fn step_span(step: &str) -> Span {
    tracing::info_span!("topicflow.step", step = %step)
}

pub fn emit_run_started(run_id: &str, topic: &str, sink_type: &str, dispatched: usize, excluded: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        topic = %topic,
        sink_type = %sink_type,
        dispatched = dispatched,
        excluded = excluded,
    );
}

pub fn emit_step_dispatched(run_id: &str, step: &str, repo: &str, branch: &str) {
    info!(event = "step.dispatched", run_id = %run_id, step = %step, repo = %repo, branch = %branch);
}

/// Failed steps log at `warn!`.
pub fn emit_step_finished(run_id: &str, outcome: &StepOutcome) {
    if outcome.status == crate::domain::outcome::StepStatus::Failed {
        warn!(
            event = "step.finished",
            run_id = %run_id,
            step = %outcome.step,
            status = %outcome.status,
            duration_ms = outcome.duration_ms,
            detail = %outcome.detail,
        );
    } else {
        info!(
            event = "step.finished",
            run_id = %run_id,
            step = %outcome.step,
            status = %outcome.status,
            duration_ms = outcome.duration_ms,
            detail = %outcome.detail,
        );
    }
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, summary: &RunSummary) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        total = summary.total,
    );
}

pub fn emit_notification_sent(run_id: &str) {
    info!(event = "notification.sent", run_id = %run_id);
}

pub fn emit_notification_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "notification.failed", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_without_subscriber() {
        let _entered = run_span("run-1", "customer.action.v1").entered();
        emit_run_started("run-1", "customer.action.v1", "realtime", 2, 2);
        emit_step_finished("run-1", &StepOutcome::failed("dbt", "dbt", "boom"));
        emit_run_finished("run-1", 10, &RunSummary::default());
    }
}
