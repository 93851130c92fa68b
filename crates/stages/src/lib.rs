//! DataSight pipeline stage implementations and the run executor.
//!
//! This crate provides the stage implementations (query planning through
//! insight generation), the prompt templates they send, and the
//! [`PipelineExecutor`] that drives the sequential dispatch-and-merge loop
//! with its streamed event sequence.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between business logic in
//! the [`pipeline`] crate and the collaborator traits (`LlmProvider`,
//! `DataSource`). They contain no domain rules of their own.
//!
//! ## Pipelines
//!
//! Two fixed stage orders exist, one per data-source family:
//!
//! | Backend | Stages |
//! |---------|--------|
//! | relational | plan → validate → execute → visualize → shape → insight |
//! | document | plan → execute → visualize → shape → insight |
//!
//! Every stage runs exactly once per run, in order. Degradation (failed or
//! empty upstream data) flows through the state's skip predicate, never
//! through skipped dispatch.

use std::sync::Arc;

use pipeline::{DataSource, LlmProvider, SchemaCatalog};

pub mod execute;
pub mod executor;
pub mod insight;
pub mod plan;
pub mod prompts;
pub mod shape;
pub mod validate;
pub mod visualize;

#[cfg(test)]
pub(crate) mod testing;

pub use execute::{ExecuteQueryStage, EXECUTE_STAGE};
pub use executor::{PipelineExecutor, RunAborted, RunEvent, RunStream, Stage};
pub use insight::{InsightStage, INSIGHT_STAGE};
pub use plan::{DocumentPlanStage, SqlPlanStage, PLAN_STAGE};
pub use shape::{ShapeChartStage, SHAPE_STAGE};
pub use validate::{ValidateSqlStage, VALIDATE_STAGE};
pub use visualize::{VisualizeStage, VISUALIZE_STAGE};

/// Builds the six-stage pipeline for a relational data source.
///
/// `helper` backs the cheap structured call of the shaping stage (chart
/// titles); every other stage talks to `llm`. Passing the same provider for
/// both is fine.
pub fn relational_pipeline(
    llm: Arc<dyn LlmProvider>,
    helper: Arc<dyn LlmProvider>,
    source: Arc<dyn DataSource>,
    schema: SchemaCatalog,
) -> PipelineExecutor {
    PipelineExecutor::new(vec![
        Box::new(SqlPlanStage::new(llm.clone(), schema.clone())),
        Box::new(ValidateSqlStage::new(llm.clone(), schema)),
        Box::new(ExecuteQueryStage::new(source)),
        Box::new(VisualizeStage::new(llm.clone())),
        Box::new(ShapeChartStage::new(helper)),
        Box::new(InsightStage::new(llm)),
    ])
}

/// Builds the five-stage pipeline for a document data source.
///
/// Same provider split as [`relational_pipeline`].
pub fn document_pipeline(
    llm: Arc<dyn LlmProvider>,
    helper: Arc<dyn LlmProvider>,
    source: Arc<dyn DataSource>,
    schema: SchemaCatalog,
) -> PipelineExecutor {
    PipelineExecutor::new(vec![
        Box::new(DocumentPlanStage::new(llm.clone(), schema)),
        Box::new(ExecuteQueryStage::new(source)),
        Box::new(VisualizeStage::new(llm.clone())),
        Box::new(ShapeChartStage::new(helper)),
        Box::new(InsightStage::new(llm)),
    ])
}
