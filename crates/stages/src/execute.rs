//! Query execution stage.
//!
//! Hands the run's query descriptor to the data-source collaborator. An
//! execution error is a degrading failure, not a fault: the stage records it
//! and writes an empty table so `rows` is populated for every downstream
//! stage regardless of outcome.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pipeline::{
    DataSource, RunFailure, RunState, StageFault, StageName, StageUpdate, Table,
};

use crate::executor::Stage;

/// Name of the execution stage in events and logs.
pub const EXECUTE_STAGE: &str = "execute";

/// Executes the planned query against the data source.
pub struct ExecuteQueryStage {
    source: Arc<dyn DataSource>,
}

impl ExecuteQueryStage {
    /// Creates the stage over a data-source adapter.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for ExecuteQueryStage {
    fn name(&self) -> StageName {
        StageName::new(EXECUTE_STAGE).expect("constant stage name")
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        if state.failure().is_some() {
            // Planning already degraded the run; make the empty result
            // explicit for downstream stages.
            return Ok(StageUpdate {
                rows: Some(Table::empty()),
                ..StageUpdate::default()
            });
        }
        let query = state.query().ok_or_else(|| {
            StageFault::new("query slot empty without a recorded failure")
        })?;

        match self.source.run(query).await {
            Ok(table) => {
                info!(
                    rows = table.row_count(),
                    columns = table.column_count(),
                    "query executed"
                );
                Ok(StageUpdate {
                    rows: Some(table),
                    ..StageUpdate::default()
                })
            }
            Err(err) => {
                warn!(%err, "query execution failed");
                Ok(StageUpdate {
                    rows: Some(Table::empty()),
                    failure: Some(RunFailure {
                        stage: StageName::new(EXECUTE_STAGE).expect("constant stage name"),
                        message: format!("query execution failed: {err}"),
                    }),
                    ..StageUpdate::default()
                })
            }
        }
    }
}
