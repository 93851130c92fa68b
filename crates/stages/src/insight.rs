//! Insight-generation stage.
//!
//! Produces the prose narrative for the final answer. Runs warmer than the
//! structured calls — the output is free text for humans, not JSON. The
//! documented no-op output for the skip path is the fixed
//! [`NO_INSIGHT_MESSAGE`] sentinel, so the narrative slot is populated on
//! every run.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pipeline::{
    CompletionRequest, LlmProvider, RunFailure, RunState, StageFault, StageName, StageUpdate,
    NO_INSIGHT_MESSAGE,
};

use crate::executor::Stage;
use crate::prompts;

/// Name of the insight stage in events and logs.
pub const INSIGHT_STAGE: &str = "insight";

/// Rows included in the prompt's data summary.
const SUMMARY_ROWS: usize = 5;

/// Sampling temperature for the prose call.
const INSIGHT_TEMPERATURE: f32 = 0.7;

/// Generates the prose insight for the result data.
pub struct InsightStage {
    llm: Arc<dyn LlmProvider>,
}

impl InsightStage {
    /// Creates the stage over an LLM provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for InsightStage {
    fn name(&self) -> StageName {
        StageName::new(INSIGHT_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        if let Some(reason) = state.skip_reason() {
            info!(?reason, "skipping insight; emitting sentinel narrative");
            return Ok(StageUpdate {
                narrative: Some(NO_INSIGHT_MESSAGE.to_owned()),
                ..StageUpdate::default()
            });
        }

        let summary = prompts::data_summary(state.rows(), SUMMARY_ROWS);
        let prompt = prompts::insight_prompt(state.question().as_str(), &summary);
        let request = CompletionRequest::with_temperature(prompt, INSIGHT_TEMPERATURE);
        match self.llm.complete(request).await {
            Ok(completion) => {
                info!(tokens = %completion.tokens, "insight generated");
                Ok(StageUpdate {
                    narrative: Some(completion.text.trim().to_owned()),
                    ..StageUpdate::default()
                })
            }
            Err(err) => {
                warn!(%err, "insight call failed");
                Ok(StageUpdate {
                    narrative: Some(NO_INSIGHT_MESSAGE.to_owned()),
                    failure: Some(RunFailure {
                        stage: StageName::new(INSIGHT_STAGE).expect("constant stage name"),
                        message: format!("insight generation failed: {err}"),
                    }),
                    ..StageUpdate::default()
                })
            }
        }
    }
}
