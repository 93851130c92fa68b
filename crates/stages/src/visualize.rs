//! Chart-kind recommendation stage.
//!
//! Summarises the result columns and the first few rows for the LLM and
//! parses its two-line reply into a [`ChartKind`]. On the skip path (prior
//! failure or zero rows) the documented no-op output is `chart_kind = none`
//! with no collaborator call. An unparseable recommendation is malformed
//! collaborator output and falls back to `none` locally.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pipeline::{
    ChartKind, CompletionRequest, LlmProvider, RunFailure, RunState, StageFault, StageName,
    StageUpdate,
};

use crate::executor::Stage;
use crate::prompts;

/// Name of the recommendation stage in events and logs.
pub const VISUALIZE_STAGE: &str = "visualize";

/// Rows included in the prompt's data summary.
const SUMMARY_ROWS: usize = 3;

/// Recommends a chart kind for the result data.
pub struct VisualizeStage {
    llm: Arc<dyn LlmProvider>,
}

impl VisualizeStage {
    /// Creates the stage over an LLM provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

/// Extracts the recommended kind token from the reply's
/// `Recommended Visualization: <kind>` line.
fn parse_recommendation(reply: &str) -> Option<ChartKind> {
    reply
        .lines()
        .find(|line| line.to_lowercase().contains("recommended visualization"))
        .and_then(|line| line.split_once(':'))
        .and_then(|(_, token)| ChartKind::parse(token))
}

#[async_trait]
impl Stage for VisualizeStage {
    fn name(&self) -> StageName {
        StageName::new(VISUALIZE_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        if let Some(reason) = state.skip_reason() {
            info!(?reason, "skipping visualization; no data to recommend for");
            return Ok(StageUpdate {
                chart_kind: Some(ChartKind::None),
                ..StageUpdate::default()
            });
        }

        let summary = prompts::data_summary(state.rows(), SUMMARY_ROWS);
        let prompt = prompts::visualization_prompt(state.question().as_str(), &summary);
        let completion = match self.llm.complete(CompletionRequest::deterministic(prompt)).await {
            Ok(c) => c,
            Err(err) => {
                warn!(%err, "visualization recommendation call failed");
                return Ok(StageUpdate {
                    chart_kind: Some(ChartKind::None),
                    failure: Some(RunFailure {
                        stage: StageName::new(VISUALIZE_STAGE).expect("constant stage name"),
                        message: format!("visualization recommendation failed: {err}"),
                    }),
                    ..StageUpdate::default()
                });
            }
        };

        let kind = match parse_recommendation(&completion.text) {
            Some(kind) => kind,
            None => {
                warn!(reply = %completion.text, "unparseable recommendation; falling back to none");
                ChartKind::None
            }
        };
        info!(%kind, "chart kind selected");
        Ok(StageUpdate {
            chart_kind: Some(kind),
            ..StageUpdate::default()
        })
    }
}
