//! Shared test doubles for the stage unit tests.
//!
//! The collaborator fakes count their calls so tests can assert that skip
//! paths make no external calls at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use pipeline::{
    ColumnName, CompletionRequest, DataSource, DataSourceError, LlmCompletion, LlmError,
    LlmProvider, QueryDescriptor, Question, RunState, Scalar, StageUpdate, Table, TokenCount,
};

/// An [`LlmProvider`] returning one canned reply (or one canned failure) and
/// counting calls.
pub(crate) struct CountingLlm {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl CountingLlm {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_owned()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for CountingLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<LlmCompletion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(LlmCompletion {
                text: text.clone(),
                tokens: TokenCount::new(10),
            }),
            None => Err(LlmError::Timeout {
                after: Duration::from_secs(5),
            }),
        }
    }
}

/// A [`DataSource`] returning a fixed-size region/cost table (or a canned
/// failure) and counting calls.
pub(crate) struct CountingSource {
    rows: Option<usize>,
    calls: AtomicUsize,
}

impl CountingSource {
    pub(crate) fn with_rows(rows: usize) -> Self {
        Self {
            rows: Some(rows),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            rows: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for CountingSource {
    async fn run(&self, _query: &QueryDescriptor) -> Result<Table, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.rows {
            Some(n) => Ok(region_cost_table(n)),
            None => Err(DataSourceError::Unavailable {
                message: "connection refused".into(),
            }),
        }
    }
}

/// A table with a categorical `region` column and a numeric `cost` column.
pub(crate) fn region_cost_table(rows: usize) -> Table {
    let data = (0..rows)
        .map(|i| {
            vec![
                Scalar::Text(format!("Region {i}")),
                Scalar::Integer(100 - i as i64),
            ]
        })
        .collect();
    Table::new(
        vec![
            ColumnName::new("region").unwrap(),
            ColumnName::new("cost").unwrap(),
        ],
        data,
    )
    .unwrap()
}

/// A fresh run state with only the question populated.
pub(crate) fn state_with_question() -> RunState {
    RunState::new(Question::new("What are the top regions by cost?").unwrap())
}

/// A run state that has already executed successfully: two result rows, no
/// failure.
pub(crate) fn state_with_rows() -> RunState {
    let mut state = state_with_question();
    state.apply(StageUpdate {
        rows: Some(region_cost_table(2)),
        ..StageUpdate::default()
    });
    state
}
