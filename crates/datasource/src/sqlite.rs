//! SQLite data-source adapter.
//!
//! Executes the SQL text a relational pipeline produces against an embedded
//! SQLite database. `rusqlite` is synchronous, so every query runs on a
//! blocking task; the connection is shared behind a mutex because one
//! adapter instance serves sequential stage calls, not concurrent query
//! load.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use pipeline::{ColumnName, DataSource, DataSourceError, QueryDescriptor, Scalar, Table};

/// [`DataSource`] over an embedded SQLite database.
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    /// Opens a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataSourceError> {
        let conn = Connection::open(path).map_err(|err| DataSourceError::Unavailable {
            message: err.to_string(),
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, DataSourceError> {
        let conn = Connection::open_in_memory().map_err(|err| DataSourceError::Unavailable {
            message: err.to_string(),
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection (used by tests to seed fixtures).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

fn scalar_from_value(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Integer(i),
        ValueRef::Real(f) => Scalar::Number(f),
        ValueRef::Text(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
        // Blobs have no chart meaning; carry them as lossy text so the row
        // shape stays rectangular.
        ValueRef::Blob(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn run_blocking(conn: &Connection, sql: &str) -> Result<Table, DataSourceError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|err| DataSourceError::QueryRejected {
            message: err.to_string(),
        })?;

    let columns: Vec<ColumnName> = stmt
        .column_names()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            // Expression columns without an alias get a positional name.
            ColumnName::new(*name).or_else(|| ColumnName::new(format!("column_{i}")))
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| DataSourceError::Decode {
            message: "statement produced a blank column name".to_owned(),
        })?;
    let width = columns.len();

    let mut rows = Vec::new();
    let mut result = stmt
        .query([])
        .map_err(|err| DataSourceError::QueryRejected {
            message: err.to_string(),
        })?;
    while let Some(row) = result.next().map_err(|err| DataSourceError::QueryRejected {
        message: err.to_string(),
    })? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            let value = row.get_ref(i).map_err(|err| DataSourceError::Decode {
                message: err.to_string(),
            })?;
            cells.push(scalar_from_value(value));
        }
        rows.push(cells);
    }

    Table::new(columns, rows).ok_or_else(|| DataSourceError::Decode {
        message: "result rows were not rectangular".to_owned(),
    })
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn run(&self, query: &QueryDescriptor) -> Result<Table, DataSourceError> {
        let sql = match query {
            QueryDescriptor::Sql(sql) => sql.clone(),
            QueryDescriptor::Plan(_) => {
                return Err(DataSourceError::UnsupportedQuery {
                    message: "SQLite adapter executes SQL text, not document plans".to_owned(),
                });
            }
        };
        debug!(%sql, "executing SQL query");
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| DataSourceError::Unavailable {
                message: "connection mutex poisoned".to_owned(),
            })?;
            run_blocking(&guard, &sql)
        })
        .await
        .map_err(|err| DataSourceError::Unavailable {
            message: format!("query task failed: {err}"),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::ColumnKind;

    fn seeded_source() -> SqliteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE projects (region TEXT, cost INTEGER, rating REAL);
             INSERT INTO projects VALUES ('A', 100, 4.5);
             INSERT INTO projects VALUES ('B', 50, NULL);",
        )
        .unwrap();
        SqliteSource::from_connection(conn)
    }

    #[tokio::test]
    async fn select_returns_columns_in_statement_order() {
        let source = seeded_source();
        let table = source
            .run(&QueryDescriptor::Sql(
                "SELECT region, cost, rating FROM projects ORDER BY cost DESC".into(),
            ))
            .await
            .unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["region", "cost", "rating"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0][0], Scalar::Text("A".into()));
        assert_eq!(table.rows()[0][1], Scalar::Integer(100));
        assert_eq!(table.rows()[1][2], Scalar::Null);
        assert_eq!(
            table.classify_columns(),
            vec![
                ColumnKind::Categorical,
                ColumnKind::Numeric,
                ColumnKind::Numeric
            ]
        );
    }

    #[tokio::test]
    async fn aggregate_aliases_become_column_names() {
        let source = seeded_source();
        let table = source
            .run(&QueryDescriptor::Sql(
                "SELECT region, SUM(cost) AS total_cost FROM projects GROUP BY region".into(),
            ))
            .await
            .unwrap();
        assert_eq!(table.columns()[1].as_str(), "total_cost");
    }

    #[tokio::test]
    async fn empty_result_is_an_empty_table() {
        let source = seeded_source();
        let table = source
            .run(&QueryDescriptor::Sql(
                "SELECT region FROM projects WHERE cost > 1000".into(),
            ))
            .await
            .unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn invalid_sql_is_rejected_with_engine_text() {
        let source = seeded_source();
        let err = source
            .run(&QueryDescriptor::Sql("SELECT nope FROM nothing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::QueryRejected { .. }));
    }

    #[tokio::test]
    async fn document_plans_are_unsupported() {
        let source = seeded_source();
        let plan = pipeline::QueryPlan {
            collection: "projects".into(),
            select: vec![],
            filters: vec![],
            order_by: vec![],
            limit: None,
        };
        let err = source
            .run(&QueryDescriptor::Plan(plan))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::UnsupportedQuery { .. }));
    }
}
