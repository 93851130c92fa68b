//! Validate-and-correct stage for relational queries.
//!
//! Interposed between SQL generation and execution: the collaborator checks
//! the generated query against the schema and either confirms it or supplies
//! a corrected query plus an issues description. The corrected query is
//! preferred whenever the collaborator reports invalid. Correction text goes
//! through the same keyword cleanup as generation — corrected output with no
//! query keyword means the plan is invalid and a descriptive failure is
//! recorded rather than attempting execution.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use pipeline::sanitize;
use pipeline::{
    CompletionRequest, LlmProvider, QueryDescriptor, RunFailure, RunState, SchemaCatalog,
    StageFault, StageName, StageUpdate,
};

use crate::executor::Stage;
use crate::prompts;

/// Name of the validation stage in events and logs.
pub const VALIDATE_STAGE: &str = "validate";

/// The verdict structure the validation prompt requests.
#[derive(Debug, Deserialize)]
struct Verdict {
    valid: bool,
    #[serde(default)]
    corrected_query: Option<String>,
    #[serde(default)]
    issues: Option<String>,
}

/// Checks generated SQL against the schema before execution.
pub struct ValidateSqlStage {
    llm: Arc<dyn LlmProvider>,
    schema: SchemaCatalog,
}

impl ValidateSqlStage {
    /// Creates the stage over an LLM provider and the schema catalog.
    pub fn new(llm: Arc<dyn LlmProvider>, schema: SchemaCatalog) -> Self {
        Self { llm, schema }
    }

    fn failure(message: String) -> StageUpdate {
        StageUpdate {
            failure: Some(RunFailure {
                stage: StageName::new(VALIDATE_STAGE).expect("constant stage name"),
                message,
            }),
            ..StageUpdate::default()
        }
    }
}

#[async_trait]
impl Stage for ValidateSqlStage {
    fn name(&self) -> StageName {
        StageName::new(VALIDATE_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        // Nothing to validate on a run that already degraded during planning.
        if state.failure().is_some() {
            return Ok(StageUpdate::default());
        }
        let sql = match state.query() {
            Some(QueryDescriptor::Sql(sql)) => sql,
            Some(QueryDescriptor::Plan(_)) => {
                return Err(StageFault::new(
                    "validate stage received a document plan; it belongs to relational pipelines only",
                ));
            }
            None => {
                return Err(StageFault::new(
                    "query slot empty without a recorded failure",
                ));
            }
        };

        let prompt = prompts::validate_sql_prompt(sql, &self.schema.to_prompt_json());
        let completion = match self.llm.complete(CompletionRequest::deterministic(prompt)).await {
            Ok(c) => c,
            Err(err) => {
                warn!(%err, "query validation call failed");
                return Ok(Self::failure(format!("query validation failed: {err}")));
            }
        };

        let verdict = match sanitize::parse_json_object::<Verdict>(&completion.text) {
            Ok(v) => v,
            Err(err) => {
                // Best-effort check: an unreadable verdict is not grounds to
                // drop a query that may well be fine. Keep the original.
                warn!(%err, "validation verdict unparseable; keeping generated query");
                return Ok(StageUpdate::default());
            }
        };

        if verdict.valid {
            info!("generated query confirmed valid");
            return Ok(StageUpdate::default());
        }

        let issues = verdict.issues.unwrap_or_else(|| "unspecified issues".to_owned());
        match verdict.corrected_query.as_deref().map(sanitize::extract_sql) {
            Some(Ok(corrected)) => {
                info!(%issues, "replacing generated query with corrected query");
                Ok(StageUpdate {
                    query: Some(QueryDescriptor::Sql(corrected)),
                    ..StageUpdate::default()
                })
            }
            Some(Err(err)) => {
                warn!(%err, "corrected query contained no query keyword");
                Ok(Self::failure(format!(
                    "query invalid ({issues}) and correction was not a query: {err}"
                )))
            }
            None => Ok(Self::failure(format!(
                "query invalid and no correction supplied: {issues}"
            ))),
        }
    }
}
