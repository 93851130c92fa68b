//! DataSight data-source infrastructure adapters.
//!
//! Implements the [`pipeline::ports::DataSource`] trait with two backends:
//!
//! - [`SqliteSource`] — executes SQL text against an embedded SQLite
//!   database via `rusqlite`, off the async runtime on a blocking task.
//! - [`FirestoreSource`] — translates a declarative [`pipeline::QueryPlan`]
//!   into a Firestore `runQuery` REST call and decodes the returned
//!   documents.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Engine wire formats, connection handling, and result
//! decoding all live here. The [`pipeline`] crate sees only the
//! `DataSource` trait and [`pipeline::Table`] values.

pub mod firestore;
pub mod sqlite;

pub use firestore::{FirestoreConfig, FirestoreSource};
pub use sqlite::SqliteSource;
