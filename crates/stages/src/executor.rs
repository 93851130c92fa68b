//! The pipeline runner: sequential stage dispatch, state merge, and the
//! streamed event sequence.
//!
//! The executor holds a statically ordered stage list. For each stage it
//! invokes [`Stage::run`] with a shared reference to the current state,
//! merges the returned [`StageUpdate`] into the state it exclusively owns,
//! and — when streaming — delivers the `(stage name, update)` pair to the
//! observer before dispatching the next stage. Stage results are therefore
//! observed in fixed stage order, never reordered or interleaved within a
//! run.
//!
//! Two failure channels exist and must not be confused:
//!
//! - A stage's *expected* inability to act (upstream failure, empty data) is
//!   communicated as a normal partial update — the stage's documented no-op
//!   output. Every stage always executes exactly once per run.
//! - A [`StageFault`] is a programming/contract fault: the runner emits a
//!   distinguished [`RunEvent::Failed`] and stops dispatching further
//!   stages.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use pipeline::{Question, RunState, StageFault, StageName, StageUpdate};

/// One named transformation step in the pipeline.
///
/// Implementations read the slots they depend on from the shared state and
/// return a partial update naming only the slots they own. They must never
/// mutate the state directly — the executor owns the merge.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The stage's fixed name, as it appears in events and logs.
    fn name(&self) -> StageName;

    /// Performs the stage's work (or its documented no-op variant) against
    /// the current state.
    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One observable event of a streamed run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A stage completed and its update was merged.
    StageCompleted {
        /// The stage that ran.
        stage: StageName,
        /// The partial update it produced.
        update: StageUpdate,
    },
    /// A stage faulted; no further stages will be dispatched.
    Failed {
        /// The stage that faulted.
        stage: StageName,
        /// The fault description.
        message: String,
    },
    /// Terminal marker: every stage ran and the final state is complete.
    Completed {
        /// The final run state.
        state: Box<RunState>,
    },
}

/// The ordered event sequence of one streamed run.
///
/// Dropping the stream stops event delivery; the in-flight stage is allowed
/// to finish on the background task and the run is then abandoned.
pub struct RunStream {
    receiver: mpsc::Receiver<RunEvent>,
}

impl RunStream {
    /// Receives the next event, or `None` once the terminal event has been
    /// delivered.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.receiver.recv().await
    }
}

/// A non-streaming run aborted by a stage fault.
#[derive(Debug, Error)]
#[error("stage '{stage}' faulted: {fault}")]
pub struct RunAborted {
    /// The stage that faulted.
    pub stage: StageName,
    /// The fault.
    pub fault: StageFault,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Executes the fixed stage list against one run state.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineExecutor {
    /// Creates an executor over an ordered stage list.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// The stage names in dispatch order.
    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs the pipeline to completion and returns the final state.
    pub async fn run(&self, question: Question) -> Result<RunState, RunAborted> {
        let mut state = RunState::new(question);
        info!(run_id = %state.run_id(), question = %state.question(), "pipeline run started");
        for stage in &self.stages {
            let name = stage.name();
            info!(run_id = %state.run_id(), stage = %name, "stage dispatched");
            match stage.run(&state).await {
                Ok(update) => state.apply(update),
                Err(fault) => {
                    error!(run_id = %state.run_id(), stage = %name, %fault, "stage faulted");
                    return Err(RunAborted { stage: name, fault });
                }
            }
        }
        info!(run_id = %state.run_id(), "pipeline run completed");
        Ok(state)
    }

    /// Runs the pipeline on a background task, delivering each stage's
    /// result as it completes.
    ///
    /// The channel is bounded, so a slow observer backpressures the run
    /// rather than buffering unboundedly. If the observer disconnects, event
    /// delivery stops and the run is abandoned after the in-flight stage.
    pub fn stream(self: Arc<Self>, question: Question) -> RunStream {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut state = RunState::new(question);
            info!(run_id = %state.run_id(), question = %state.question(), "streamed run started");
            for stage in &self.stages {
                let name = stage.name();
                match stage.run(&state).await {
                    Ok(update) => {
                        state.apply(update.clone());
                        let event = RunEvent::StageCompleted {
                            stage: name,
                            update,
                        };
                        if tx.send(event).await.is_err() {
                            info!(run_id = %state.run_id(), "observer disconnected; abandoning run");
                            return;
                        }
                    }
                    Err(fault) => {
                        error!(run_id = %state.run_id(), stage = %name, %fault, "stage faulted");
                        let _ = tx
                            .send(RunEvent::Failed {
                                stage: name,
                                message: fault.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
            info!(run_id = %state.run_id(), "streamed run completed");
            let _ = tx
                .send(RunEvent::Completed {
                    state: Box::new(state),
                })
                .await;
        });
        RunStream { receiver: rx }
    }
}
