//! DataSight streaming transport.
//!
//! Frames a run's event stream as server-sent events so any HTTP layer can
//! pipe stage results to a browser as they arrive. One frame per event:
//!
//! ```text
//! data: {"event": "<stage>", "data": {…partial update…}}
//!
//! data: {"event": "end"}
//! ```
//!
//! A stage fault produces an `error` frame carrying the fault text, after
//! which the stream closes. The HTTP server itself is out of scope; this
//! crate owns only the wire framing.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Wire framing only. The [`stages`] crate sees nothing
//! of SSE; this crate sees nothing of stage internals beyond
//! [`stages::RunEvent`].

use serde_json::{json, Value};
use tracing::debug;

use stages::{RunEvent, RunStream};

/// Event name of the terminal frame.
pub const END_EVENT: &str = "end";

/// Event name of the fault frame.
pub const ERROR_EVENT: &str = "error";

fn frame_body(event: &RunEvent) -> Value {
    match event {
        RunEvent::StageCompleted { stage, update } => {
            // Serialising a plain update struct cannot fail.
            let data = serde_json::to_value(update).unwrap_or_default();
            json!({ "event": stage.as_str(), "data": data })
        }
        RunEvent::Failed { stage, message } => json!({
            "event": ERROR_EVENT,
            "data": format!("stage '{stage}' faulted: {message}"),
        }),
        RunEvent::Completed { .. } => json!({ "event": END_EVENT }),
    }
}

/// Renders one event as an SSE `data:` frame, including the blank-line
/// terminator.
pub fn sse_frame(event: &RunEvent) -> String {
    format!("data: {}\n\n", frame_body(event))
}

/// Adapts a [`RunStream`] into a sequence of SSE frames.
pub struct SseFrames {
    stream: RunStream,
}

impl SseFrames {
    /// Wraps a run's event stream.
    pub fn new(stream: RunStream) -> Self {
        Self { stream }
    }

    /// Returns the next frame, or `None` once the stream has closed.
    ///
    /// The final frame before `None` is either the `end` marker or an
    /// `error` frame.
    pub async fn next_frame(&mut self) -> Option<String> {
        let event = self.stream.next_event().await?;
        let frame = sse_frame(&event);
        debug!(bytes = frame.len(), "SSE frame ready");
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use pipeline::{ChartKind, Question, RunState, StageFault, StageName, StageUpdate};
    use stages::{PipelineExecutor, Stage};

    #[test]
    fn stage_frame_names_the_stage_and_carries_the_update() {
        let event = RunEvent::StageCompleted {
            stage: StageName::new("visualize").unwrap(),
            update: StageUpdate {
                chart_kind: Some(ChartKind::Bar),
                ..StageUpdate::default()
            },
        };
        let frame = sse_frame(&event);
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
        let body: Value = serde_json::from_str(frame.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(body["event"], "visualize");
        assert_eq!(body["data"]["chart_kind"], "bar");
    }

    #[test]
    fn empty_update_frame_has_an_empty_data_object() {
        let event = RunEvent::StageCompleted {
            stage: StageName::new("validate").unwrap(),
            update: StageUpdate::default(),
        };
        let body: Value = serde_json::from_str(
            sse_frame(&event).trim_start_matches("data: ").trim(),
        )
        .unwrap();
        assert_eq!(body["data"], json!({}));
    }

    #[test]
    fn completed_frame_is_the_end_marker() {
        let event = RunEvent::Completed {
            state: Box::new(RunState::new(Question::new("q").unwrap())),
        };
        assert_eq!(sse_frame(&event), "data: {\"event\":\"end\"}\n\n");
    }

    #[test]
    fn failed_frame_carries_the_fault_text() {
        let event = RunEvent::Failed {
            stage: StageName::new("execute").unwrap(),
            message: "query slot empty without recorded failure".into(),
        };
        let body: Value = serde_json::from_str(
            sse_frame(&event).trim_start_matches("data: ").trim(),
        )
        .unwrap();
        assert_eq!(body["event"], "error");
        assert!(body["data"]
            .as_str()
            .unwrap()
            .contains("stage 'execute' faulted"));
    }

    struct NoOpStage(&'static str);

    #[async_trait]
    impl Stage for NoOpStage {
        fn name(&self) -> StageName {
            StageName::new(self.0).unwrap()
        }

        async fn run(&self, _state: &RunState) -> Result<StageUpdate, StageFault> {
            Ok(StageUpdate::default())
        }
    }

    #[tokio::test]
    async fn frames_end_with_the_terminal_marker() {
        let executor = Arc::new(PipelineExecutor::new(vec![
            Box::new(NoOpStage("plan")) as Box<dyn Stage>,
            Box::new(NoOpStage("insight")),
        ]));
        let mut frames = SseFrames::new(executor.stream(Question::new("q").unwrap()));

        let mut seen = Vec::new();
        while let Some(frame) = frames.next_frame().await {
            seen.push(frame);
        }
        assert_eq!(seen.len(), 3);
        assert!(seen[0].contains("\"event\":\"plan\""));
        assert!(seen[1].contains("\"event\":\"insight\""));
        assert_eq!(seen[2], "data: {\"event\":\"end\"}\n\n");
    }
}
