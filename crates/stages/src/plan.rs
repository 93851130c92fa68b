//! Query planning stages: question → query descriptor.
//!
//! Two flavours exist, one per data-source family. Both send the schema
//! catalog and the question to the LLM collaborator and sanitise the reply;
//! a reply that cannot be turned into a query records a descriptive failure
//! so the rest of the run degrades instead of executing garbage.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pipeline::sanitize;
use pipeline::{
    CompletionRequest, LlmProvider, QueryDescriptor, QueryPlan, RunFailure, RunState,
    SchemaCatalog, StageFault, StageName, StageUpdate,
};

use crate::executor::Stage;
use crate::prompts;

/// Name of the planning stage in events and logs.
pub const PLAN_STAGE: &str = "plan";

fn plan_failure(message: String) -> StageUpdate {
    StageUpdate {
        failure: Some(RunFailure {
            stage: StageName::new(PLAN_STAGE).expect("constant stage name"),
            message,
        }),
        ..StageUpdate::default()
    }
}

// ---------------------------------------------------------------------------

/// Generates a declarative [`QueryPlan`] for a document store.
pub struct DocumentPlanStage {
    llm: Arc<dyn LlmProvider>,
    schema: SchemaCatalog,
}

impl DocumentPlanStage {
    /// Creates the stage over an LLM provider and the catalog to embed in
    /// the prompt.
    pub fn new(llm: Arc<dyn LlmProvider>, schema: SchemaCatalog) -> Self {
        Self { llm, schema }
    }
}

#[async_trait]
impl Stage for DocumentPlanStage {
    fn name(&self) -> StageName {
        StageName::new(PLAN_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let prompt = prompts::document_plan_prompt(
            state.question().as_str(),
            &self.schema.to_prompt_json(),
        );
        let completion = match self.llm.complete(CompletionRequest::deterministic(prompt)).await {
            Ok(c) => c,
            Err(err) => {
                warn!(%err, "query plan generation failed");
                return Ok(plan_failure(format!("query plan generation failed: {err}")));
            }
        };
        match sanitize::parse_json_object::<QueryPlan>(&completion.text) {
            Ok(plan) => {
                info!(collection = %plan.collection, "query plan generated");
                Ok(StageUpdate {
                    query: Some(QueryDescriptor::Plan(plan)),
                    ..StageUpdate::default()
                })
            }
            Err(err) => {
                warn!(%err, "query plan response was not a valid plan");
                Ok(plan_failure(format!("query plan was unparseable: {err}")))
            }
        }
    }
}

// ---------------------------------------------------------------------------

/// Generates SQL text for a relational engine.
pub struct SqlPlanStage {
    llm: Arc<dyn LlmProvider>,
    schema: SchemaCatalog,
}

impl SqlPlanStage {
    /// Creates the stage over an LLM provider and the catalog to embed in
    /// the prompt.
    pub fn new(llm: Arc<dyn LlmProvider>, schema: SchemaCatalog) -> Self {
        Self { llm, schema }
    }
}

#[async_trait]
impl Stage for SqlPlanStage {
    fn name(&self) -> StageName {
        StageName::new(PLAN_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let prompt =
            prompts::sql_plan_prompt(state.question().as_str(), &self.schema.to_prompt_json());
        let completion = match self.llm.complete(CompletionRequest::deterministic(prompt)).await {
            Ok(c) => c,
            Err(err) => {
                warn!(%err, "SQL generation failed");
                return Ok(plan_failure(format!("SQL generation failed: {err}")));
            }
        };
        match sanitize::extract_sql(&completion.text) {
            Ok(sql) => {
                info!("SQL query generated");
                Ok(StageUpdate {
                    query: Some(QueryDescriptor::Sql(sql)),
                    ..StageUpdate::default()
                })
            }
            Err(err) => {
                warn!(%err, "SQL response contained no query");
                Ok(plan_failure(format!("generated text was not a query: {err}")))
            }
        }
    }
}
