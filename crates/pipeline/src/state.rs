//! The Run State and its merge discipline.
//!
//! One [`RunState`] is created per pipeline execution and threaded through
//! every stage. Stages never mutate it: each returns a [`StageUpdate`] —
//! a partial update naming only the slots it owns — and the runner merges
//! the update into the state it exclusively owns. This keeps the shared-
//! mutable-record pattern of the source design without any aliasing across
//! concurrent runs.
//!
//! The question has no [`StageUpdate`] slot, so no stage can overwrite it;
//! the `failure` slot is write-once within a run.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ChartKind, ChartPayload, QueryDescriptor, RunId, StageName, Table};

/// Sentinel narrative for runs that degrade before the insight stage can act.
pub const NO_INSIGHT_MESSAGE: &str = "No insight available.";

// ---------------------------------------------------------------------------

/// The natural-language analytics question a run answers.
///
/// Immutable after run creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question(String);

impl Question {
    /// Creates a [`Question`], returning `None` if the text is empty or
    /// whitespace.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let t = text.into();
        if t.trim().is_empty() {
            None
        } else {
            Some(Self(t))
        }
    }

    /// Returns the question text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------

/// A recorded run failure: which stage degraded the run, and why.
///
/// Downstream stages treat a populated failure as the signal to produce
/// their documented no-op outputs instead of calling collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Stage that recorded the failure.
    pub stage: StageName,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

// ---------------------------------------------------------------------------

/// Why a downstream stage substitutes its no-op output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An earlier stage recorded a failure.
    Failed,
    /// The query executed but returned zero rows.
    NoRows,
}

// ---------------------------------------------------------------------------

/// Partial state update returned by one stage.
///
/// Absent slots leave the state untouched; present slots overwrite. There is
/// deliberately no `question` slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    /// Generated or corrected query descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryDescriptor>,
    /// Tabular execution result. An execution failure still writes an empty
    /// table here so `rows` is never absent downstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Table>,
    /// Selected chart kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_kind: Option<ChartKind>,
    /// Rendering-ready chart payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_payload: Option<ChartPayload>,
    /// Prose insight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Degrading failure recorded by this stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl StageUpdate {
    /// Returns `true` if the update touches no slot at all.
    pub fn is_empty(&self) -> bool {
        *self == StageUpdate::default()
    }
}

// ---------------------------------------------------------------------------

/// The single record threaded through all stages of one pipeline execution.
///
/// Created once per run; merged into via [`RunState::apply`], never replaced
/// wholesale; discarded after the final stage's output is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    run_id: RunId,
    question: Question,
    query: Option<QueryDescriptor>,
    rows: Table,
    chart_kind: ChartKind,
    chart_payload: Option<ChartPayload>,
    narrative: Option<String>,
    failure: Option<RunFailure>,
}

impl RunState {
    /// Creates the initial state for a run.
    pub fn new(question: Question) -> Self {
        Self {
            run_id: RunId::new_random(),
            question,
            query: None,
            rows: Table::empty(),
            chart_kind: ChartKind::None,
            chart_payload: None,
            narrative: None,
            failure: None,
        }
    }

    /// The run's correlation identifier.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The original question. Immutable for the lifetime of the run.
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// The query produced by the planning (and possibly validation) stages.
    pub fn query(&self) -> Option<&QueryDescriptor> {
        self.query.as_ref()
    }

    /// The execution result. Empty until the execution stage has run, and
    /// empty forever on a degraded run — never absent.
    pub fn rows(&self) -> &Table {
        &self.rows
    }

    /// The selected chart kind ([`ChartKind::None`] until selection).
    pub fn chart_kind(&self) -> ChartKind {
        self.chart_kind
    }

    /// The shaped chart payload, once the shaping stage has run.
    pub fn chart_payload(&self) -> Option<&ChartPayload> {
        self.chart_payload.as_ref()
    }

    /// The prose insight, once the insight stage has run.
    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    /// The recorded failure, if any stage degraded the run.
    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Merges a stage's partial update into this state.
    ///
    /// Present slots overwrite; absent slots are untouched. The `failure`
    /// slot is write-once: later failure writes are ignored (and logged),
    /// so the first degradation of a run is the one reported.
    pub fn apply(&mut self, update: StageUpdate) {
        if let Some(query) = update.query {
            self.query = Some(query);
        }
        if let Some(rows) = update.rows {
            self.rows = rows;
        }
        if let Some(kind) = update.chart_kind {
            self.chart_kind = kind;
        }
        if let Some(payload) = update.chart_payload {
            self.chart_payload = Some(payload);
        }
        if let Some(narrative) = update.narrative {
            self.narrative = Some(narrative);
        }
        if let Some(failure) = update.failure {
            match &self.failure {
                None => self.failure = Some(failure),
                Some(existing) => {
                    warn!(
                        existing = %existing,
                        ignored = %failure,
                        "failure slot already populated; keeping first failure"
                    );
                }
            }
        }
    }

    /// The centralised conditional-skip predicate.
    ///
    /// Stages that depend on tabular results consult this before doing real
    /// work; a `Some` answer means "produce your documented no-op update and
    /// make no collaborator call". Each stage maps the reason to its own
    /// no-op output, so the check stays centralised while the outputs stay
    /// per-stage.
    ///
    /// Only meaningful after the execution stage: before it, `rows` is
    /// trivially empty. Pre-execution stages check [`RunState::failure`]
    /// directly.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if self.failure.is_some() {
            Some(SkipReason::Failed)
        } else if self.rows.is_empty() {
            Some(SkipReason::NoRows)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnName, Scalar};

    fn question() -> Question {
        Question::new("What are the top regions by cost?").unwrap()
    }

    fn stage(name: &str) -> StageName {
        StageName::new(name).unwrap()
    }

    fn one_row_table() -> Table {
        Table::new(
            vec![ColumnName::new("n").unwrap()],
            vec![vec![Scalar::Integer(1)]],
        )
        .unwrap()
    }

    #[test]
    fn question_rejects_blank_input() {
        assert!(Question::new("   ").is_none());
    }

    #[test]
    fn merge_overwrites_present_slots_only() {
        let mut state = RunState::new(question());
        state.apply(StageUpdate {
            query: Some(QueryDescriptor::Sql("SELECT 1".into())),
            ..StageUpdate::default()
        });
        state.apply(StageUpdate {
            rows: Some(one_row_table()),
            ..StageUpdate::default()
        });
        // The second update did not mention the query slot.
        assert_eq!(
            state.query(),
            Some(&QueryDescriptor::Sql("SELECT 1".into()))
        );
        assert_eq!(state.rows().row_count(), 1);
    }

    #[test]
    fn failure_slot_is_write_once() {
        let mut state = RunState::new(question());
        state.apply(StageUpdate {
            failure: Some(RunFailure {
                stage: stage("execute"),
                message: "engine down".into(),
            }),
            ..StageUpdate::default()
        });
        state.apply(StageUpdate {
            failure: Some(RunFailure {
                stage: stage("insight"),
                message: "later".into(),
            }),
            ..StageUpdate::default()
        });
        assert_eq!(state.failure().unwrap().message, "engine down");
    }

    #[test]
    fn skip_reason_prefers_failure_over_no_rows() {
        let mut state = RunState::new(question());
        assert_eq!(state.skip_reason(), Some(SkipReason::NoRows));
        state.apply(StageUpdate {
            failure: Some(RunFailure {
                stage: stage("plan"),
                message: "bad plan".into(),
            }),
            ..StageUpdate::default()
        });
        assert_eq!(state.skip_reason(), Some(SkipReason::Failed));
    }

    #[test]
    fn skip_reason_clears_once_rows_arrive() {
        let mut state = RunState::new(question());
        state.apply(StageUpdate {
            rows: Some(one_row_table()),
            ..StageUpdate::default()
        });
        assert_eq!(state.skip_reason(), None);
    }
}
