//! The step table and the sink-type selector over it.
//!
//! Selection is a pure function of [`SinkType`]: a step is dispatched only when
//! it is enabled and its applicability contains the sink. Everything else is
//! reported as an [`ExcludedStep`] so operators can see why it did not run.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::error::{OnboardError, OnboardResult};
use crate::domain::outcome::ExcludedStep;
use crate::domain::topic::SinkType;
use crate::mutation::TopicMutation;
use crate::scm::RepoRole;
use crate::steps::definition::{ChangeTemplate, StepDefinition};

pub const HELM_APPS_STEP: &str = "helm-apps";
pub const DATA_AIRFLOW_STEP: &str = "data-airflow";
pub const DBT_STEP: &str = "dbt";
pub const DBT_REALTIME_STEP: &str = "dbt-realtime";

/// Mutations plugged into [`StepCatalog::standard`], one per step.
#[derive(Clone)]
pub struct StandardMutations {
    pub helm_apps: Arc<dyn TopicMutation>,
    pub data_airflow: Arc<dyn TopicMutation>,
    pub dbt_s3: Arc<dyn TopicMutation>,
    pub dbt_realtime: Arc<dyn TopicMutation>,
}

impl StandardMutations {
    /// Use the same mutation for every step.
    pub fn uniform(mutation: Arc<dyn TopicMutation>) -> Self {
        Self {
            helm_apps: Arc::clone(&mutation),
            data_airflow: Arc::clone(&mutation),
            dbt_s3: Arc::clone(&mutation),
            dbt_realtime: mutation,
        }
    }
}

/// Ordered, immutable table of step definitions. Declaration order is the
/// order of outcomes in every run result.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    /// Rejects duplicate step ids.
    pub fn new(steps: Vec<StepDefinition>) -> OnboardResult<Self> {
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id().to_string()) {
                return Err(OnboardError::Configuration(format!(
                    "duplicate step id '{}'",
                    step.id()
                )));
            }
        }
        Ok(Self { steps })
    }

    /// The deployment's step table:
    ///
    /// | step           | repository   | sinks          |
    /// |----------------|--------------|----------------|
    /// | `helm-apps`    | helm-apps    | realtime, s3   |
    /// | `data-airflow` | data-airflow | realtime       |
    /// | `dbt`          | dbt          | s3             |
    /// | `dbt-realtime` | dbt          | realtime (off) |
    pub fn standard(mutations: StandardMutations) -> OnboardResult<Self> {
        let helm_apps = StepDefinition::new(
            HELM_APPS_STEP,
            "Add Kafka Topic to Sink Connector Configuration in helm-apps",
            RepoRole::HelmApps,
            [SinkType::Realtime, SinkType::S3],
            ChangeTemplate {
                commit_message: "Add Kafka topic: {topic}\n\n\
                    - Topic: {topic}\n\
                    - Value Type: {value_type}\n\
                    - Sink Type: {sink_type}\n\n\
                    Auto-generated by topicflow"
                    .to_string(),
                pr_title: "Add Kafka topic: {topic}".to_string(),
                pr_body: "## Kafka Topic Configuration\n\n\
                    **Topic:** `{topic}`\n\
                    **Value Type:** {value_type}\n\
                    **Sink Type:** {sink_type}\n\n\
                    ### Changes\n\
                    - Added topic to Kafka Connect Snowflake sink configuration\n\n\
                    ---\n\
                    *Auto-generated by topicflow*"
                    .to_string(),
            },
            mutations.helm_apps,
        )?
        .with_branch_prefix("add-snowflake-sink")
        .with_noop_hint("No changes detected. Topic might already be configured in sink.");

        let data_airflow = StepDefinition::new(
            DATA_AIRFLOW_STEP,
            "Add Stream Task Config to Airflow DAG in data-airflow",
            RepoRole::DataAirflow,
            [SinkType::Realtime],
            ChangeTemplate {
                commit_message: "Add stream config: {table_name}\n\n\
                    - Topic: {topic}\n\
                    - Table: {table_name}\n\n\
                    Auto-generated by topicflow"
                    .to_string(),
                pr_title: "Add stream config: {table_name}".to_string(),
                pr_body: "## Stream Configuration\n\n\
                    **Topic:** `{topic}`\n\
                    **Table:** `{table_name}`\n\n\
                    ### Changes\n\
                    - Added StreamTaskConfig to Airflow DAG\n\n\
                    ---\n\
                    *Auto-generated by topicflow*"
                    .to_string(),
            },
            mutations.data_airflow,
        )?
        .with_branch_prefix("add-stream-config")
        .with_noop_hint("No changes detected. Stream config might already exist.")
        .unlocking_manual_trigger();

        let dbt_s3 = StepDefinition::new(
            DBT_STEP,
            "Add S3 External Source Bootstrap in dbt",
            RepoRole::Dbt,
            [SinkType::S3],
            ChangeTemplate {
                commit_message: "Add S3 external source: {topic}\n\n\
                    - Topic: {topic}\n\
                    - Value type: {value_type}\n\
                    - Table: {table_name}\n\n\
                    Auto-generated by topicflow"
                    .to_string(),
                pr_title: "Add S3 external source: {topic}".to_string(),
                pr_body: "## S3 External Source Bootstrap\n\n\
                    **Topic:** `{topic}`\n\
                    **Value Type:** `{value_type}`\n\
                    **Table:** `{table_name}`\n\n\
                    ### Changes\n\
                    - Generated external source definition for S3 data\n\
                    - Created base model: `stg_kafka__{table_name}__external.sql`\n\
                    - Created typecast model: `stg_kafka__{table_name}.sql`\n\n\
                    ---\n\
                    *Auto-generated by topicflow*"
                    .to_string(),
            },
            mutations.dbt_s3,
        )?
        .with_branch_prefix("add-s3-external")
        .with_noop_hint("No changes detected. Model or external source might already exist.");

        let dbt_realtime = StepDefinition::new(
            DBT_REALTIME_STEP,
            "Create Materialized Model for Kafka Topic in dbt",
            RepoRole::Dbt,
            [SinkType::Realtime],
            ChangeTemplate {
                commit_message: "Add dbt extraction layer: {table_name}\n\n\
                    - Topic: {topic}\n\
                    - Table: {table_name}\n\n\
                    Auto-generated by topicflow"
                    .to_string(),
                pr_title: "Add extraction layer: {table_name}".to_string(),
                pr_body: "## dbt Extraction Layer\n\n\
                    **Topic:** `{topic}`\n\
                    **Table:** `{table_name}`\n\n\
                    ### Changes\n\
                    - Added source definition\n\
                    - Created staging model\n\
                    - Added tests\n\n\
                    ---\n\
                    *Auto-generated by topicflow*"
                    .to_string(),
            },
            mutations.dbt_realtime,
        )?
        .with_branch_prefix("add-extraction")
        .with_noop_hint("No changes detected. Model or external source might already exist.")
        .disabled("pending QA and production readiness");

        Self::new(vec![helm_apps, data_airflow, dbt_s3, dbt_realtime])
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn get(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id() == id)
    }

    /// Active steps for `sink`, in declaration order.
    pub fn select(&self, sink: SinkType) -> Vec<&StepDefinition> {
        self.steps.iter().filter(|s| s.is_active_for(sink)).collect()
    }

    /// [`Self::select`] for a sink type given by name. Unknown names are an
    /// [`OnboardError::Configuration`].
    pub fn select_named(&self, sink: &str) -> OnboardResult<Vec<&StepDefinition>> {
        let sink: SinkType = sink.parse()?;
        Ok(self.select(sink))
    }

    /// Defined steps not dispatched for `sink`, with the reason.
    pub fn exclusions(&self, sink: SinkType) -> Vec<ExcludedStep> {
        self.steps
            .iter()
            .filter(|s| !s.is_active_for(sink))
            .map(|s| {
                let reason = if !s.applies_to(sink) {
                    format!("not applicable for {sink} sinks")
                } else {
                    format!("disabled: {}", s.disabled_reason().unwrap_or("no reason given"))
                };
                ExcludedStep {
                    step: s.id().to_string(),
                    title: s.title().to_string(),
                    reason,
                }
            })
            .collect()
    }
}
