//! Chart-shaping stage.
//!
//! Turns the result table into the rendering-ready payload for the selected
//! kind. The shaping itself is pure ([`pipeline::charts`]); the only
//! collaborator call here is the best-effort title suggestion, which falls
//! back to the raw question text and never raises.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use pipeline::sanitize;
use pipeline::{
    shape_chart, ChartKind, ChartOptions, ChartPayload, CompletionRequest, LlmProvider, RunState,
    StageFault, StageName, StageUpdate,
};

use crate::executor::Stage;
use crate::prompts;

/// Name of the shaping stage in events and logs.
pub const SHAPE_STAGE: &str = "shape";

#[derive(Debug, Deserialize)]
struct TitleReply {
    title: String,
}

/// Shapes the result table into a chart payload.
pub struct ShapeChartStage {
    llm: Arc<dyn LlmProvider>,
}

impl ShapeChartStage {
    /// Creates the stage over an LLM provider (used only for the title
    /// suggestion).
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Best-effort title suggestion. Any failure — transport, malformed
    /// JSON, missing key — falls back to the question text.
    async fn chart_title(&self, state: &RunState) -> String {
        let columns: Vec<&str> = state.rows().columns().iter().map(|c| c.as_str()).collect();
        let prompt = prompts::chart_title_prompt(state.question().as_str(), &columns);
        match self.llm.complete(CompletionRequest::deterministic(prompt)).await {
            Ok(completion) => match sanitize::parse_json_object::<TitleReply>(&completion.text) {
                Ok(reply) => reply.title,
                Err(err) => {
                    warn!(%err, "title suggestion unparseable; using question as title");
                    state.question().as_str().to_owned()
                }
            },
            Err(err) => {
                warn!(%err, "title suggestion call failed; using question as title");
                state.question().as_str().to_owned()
            }
        }
    }
}

#[async_trait]
impl Stage for ShapeChartStage {
    fn name(&self) -> StageName {
        StageName::new(SHAPE_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        // Skip path and "no chart selected" share the fixed no-data payload
        // and make no collaborator call.
        if state.skip_reason().is_some() || state.chart_kind() == ChartKind::None {
            info!("no chart to shape; emitting no-data payload");
            return Ok(StageUpdate {
                chart_payload: Some(ChartPayload::no_data()),
                ..StageUpdate::default()
            });
        }

        let options = ChartOptions {
            title: self.chart_title(state).await,
        };
        let payload = match shape_chart(state.chart_kind(), state.rows(), options) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, kind = %state.chart_kind(), "result shape unsuitable for chart kind");
                ChartPayload::Unavailable {
                    error: format!("Failed to format data. Details: {err}"),
                }
            }
        };
        Ok(StageUpdate {
            chart_payload: Some(payload),
            ..StageUpdate::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{state_with_question, state_with_rows, CountingLlm};
    use pipeline::ChartKind;

    fn state_with_kind(kind: ChartKind) -> RunState {
        let mut state = state_with_rows();
        state.apply(StageUpdate {
            chart_kind: Some(kind),
            ..StageUpdate::default()
        });
        state
    }

    #[tokio::test]
    async fn shapes_bar_payload_with_llm_title() {
        let llm = Arc::new(CountingLlm::replying(r#"{"title": "Costs by region"}"#));
        let stage = ShapeChartStage::new(llm.clone());
        let update = stage.run(&state_with_kind(ChartKind::Bar)).await.unwrap();
        match update.chart_payload.unwrap() {
            ChartPayload::Bar { data, options } => {
                assert_eq!(options.title, "Costs by region");
                assert_eq!(data.labels.len(), 2);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn title_failure_falls_back_to_question() {
        let llm = Arc::new(CountingLlm::failing());
        let stage = ShapeChartStage::new(llm);
        let state = state_with_kind(ChartKind::Bar);
        let update = stage.run(&state).await.unwrap();
        match update.chart_payload.unwrap() {
            ChartPayload::Bar { options, .. } => {
                assert_eq!(options.title, state.question().as_str());
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shape_violation_becomes_unavailable_payload() {
        // The fixture table has one categorical and one numeric column,
        // which cannot satisfy a scatter plot.
        let llm = Arc::new(CountingLlm::replying(r#"{"title": "t"}"#));
        let stage = ShapeChartStage::new(llm);
        let update = stage.run(&state_with_kind(ChartKind::Scatter)).await.unwrap();
        match update.chart_payload.unwrap() {
            ChartPayload::Unavailable { error } => {
                assert!(error.contains("two numeric columns"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(update.failure.is_none());
    }

    #[tokio::test]
    async fn empty_rows_emit_no_data_without_collaborator_call() {
        let llm = Arc::new(CountingLlm::replying("unused"));
        let stage = ShapeChartStage::new(llm.clone());
        let update = stage.run(&state_with_question()).await.unwrap();
        assert_eq!(update.chart_payload, Some(ChartPayload::no_data()));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn chart_kind_none_skips_title_call() {
        let llm = Arc::new(CountingLlm::replying("unused"));
        let stage = ShapeChartStage::new(llm.clone());
        let update = stage.run(&state_with_kind(ChartKind::None)).await.unwrap();
        assert_eq!(update.chart_payload, Some(ChartPayload::no_data()));
        assert_eq!(llm.calls(), 0);
    }
}
