//! Core orchestration domain for DataSight.
//!
//! DataSight answers natural-language analytics questions by running a fixed
//! sequence of stages over one shared run state: translate the question into
//! a query, validate and execute it, choose a chart kind, shape the result
//! for rendering, and produce a prose insight. This crate contains every
//! domain concept that sequence relies on — the run state and its merge
//! discipline, tabular value types, chart shaping, query descriptors, the
//! untrusted-text sanitizer, and the port traits for the two external
//! collaborators.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply
//! it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`RunId`, `StageName`, etc.) |
//! | [`types`] | Tabular value types (`Scalar`, `Table`, `Timestamp`, `TokenCount`) |
//! | [`state`] | Run state, partial updates, merge, and the skip predicate |
//! | [`query`] | Query descriptors and the schema catalog |
//! | [`charts`] | Chart kinds and rendering-ready payload shaping |
//! | [`sanitize`] | Typed cleanup of untrusted model output |
//! | [`errors`] | Collaborator error and retry-policy types |
//! | [`ports`] | `LlmProvider` and `DataSource` collaborator traits |

pub mod charts;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod query;
pub mod sanitize;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use charts::{
    shape_chart, CategoryData, ChartKind, ChartOptions, ChartPayload, ChartShapeError, LineData,
    PieSlice, ScatterData, ScatterPoint, ScatterSeries, Series, NO_DATA_MESSAGE,
};
pub use errors::{DataSourceError, LlmError, RetryPolicy, StageFault};
pub use identifiers::{CollectionName, ColumnName, ModelName, RunId, StageName};
pub use ports::{CompletionRequest, DataSource, LlmCompletion, LlmProvider};
pub use query::{
    CollectionSchema, FieldType, FilterClause, FilterOp, OrderClause, QueryDescriptor, QueryPlan,
    SchemaCatalog, SortDirection,
};
pub use sanitize::SanitizeError;
pub use state::{Question, RunFailure, RunState, SkipReason, StageUpdate, NO_INSIGHT_MESSAGE};
pub use types::{ColumnKind, Scalar, Table, Timestamp, TokenCount};
