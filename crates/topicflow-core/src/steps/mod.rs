//! Step definitions and the catalog that selects them per sink type.

pub mod catalog;
pub mod definition;

pub use catalog::{
    StandardMutations, StepCatalog, DATA_AIRFLOW_STEP, DBT_REALTIME_STEP, DBT_STEP, HELM_APPS_STEP,
};
pub use definition::{ChangeTemplate, RenderedChange, StepDefinition};
