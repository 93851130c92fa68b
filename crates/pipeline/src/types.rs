//! Shared value types for the DataSight pipeline domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. every row of a [`Table`] has the
//! same width as the column header) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ColumnName;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// One cell of a tabular query result.
///
/// The closed set of scalar shapes a data source may return. Serialises to the
/// natural JSON value (`null`, boolean, number, string, RFC 3339 timestamp
/// string) so chart payloads and streamed events carry plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Absent value (e.g. a document missing a projected field).
    Null,
    /// Boolean flag. Treated as categorical for chart classification.
    Bool(bool),
    /// Integer value. Kept distinct from [`Scalar::Number`] so integer columns
    /// serialise without a fractional part.
    Integer(i64),
    /// Floating-point value.
    Number(f64),
    /// UTC timestamp.
    Timestamp(Timestamp),
    /// Free text.
    Text(String),
}

impl Scalar {
    /// Returns `true` for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Returns the numeric value as an `f64`, if this scalar is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Renders the scalar as display text (labels, axis values, prompt
    /// summaries). `Null` renders as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Timestamp(t) => t.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

// ---------------------------------------------------------------------------

/// Classification of a result column, derived from its scalars.
///
/// Drives chart shaping: bar labels come from the first categorical column,
/// series values from numeric columns, and temporal columns are rendered as
/// text on the x-axis but never used as series values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Text-like column (text, boolean, or entirely null).
    Categorical,
    /// Integer or floating-point column.
    Numeric,
    /// Timestamp column.
    Temporal,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// An ordered tabular query result.
///
/// Columns are held in discovery order (declared projection order for a
/// planned query, statement order for SQL, first-seen order otherwise);
/// "first categorical column" and similar chart-shaping rules are defined in
/// terms of this order. Every row has exactly one scalar per column.
///
/// Absence of data is always an empty table, never a missing value — the
/// run state's `rows` slot is non-optional by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<ColumnName>,
    #[serde(rename = "data")]
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Creates an empty table with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Creates a table from a column header and row data.
    ///
    /// Returns `None` if any row's width differs from the column count.
    #[must_use]
    pub fn new(columns: Vec<ColumnName>, rows: Vec<Vec<Scalar>>) -> Option<Self> {
        if rows.iter().any(|r| r.len() != columns.len()) {
            None
        } else {
            Some(Self { columns, rows })
        }
    }

    /// Returns the column header in result order.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the rows in result order.
    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    /// Iterates the cells of column `index` in row order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers obtain indices from
    /// [`Table::columns`] or [`Table::classify_columns`].
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Scalar> {
        assert!(index < self.columns.len(), "column index out of range");
        self.rows.iter().map(move |r| &r[index])
    }

    /// Classifies every column by inspecting its scalars across all rows.
    ///
    /// A column is [`ColumnKind::Numeric`] if every non-null cell is numeric,
    /// [`ColumnKind::Temporal`] if every non-null cell is a timestamp, and
    /// [`ColumnKind::Categorical`] otherwise (including all-null columns).
    pub fn classify_columns(&self) -> Vec<ColumnKind> {
        (0..self.columns.len())
            .map(|i| {
                let mut numeric = true;
                let mut temporal = true;
                let mut saw_value = false;
                for cell in self.column_values(i) {
                    match cell {
                        Scalar::Null => {}
                        Scalar::Integer(_) | Scalar::Number(_) => {
                            saw_value = true;
                            temporal = false;
                        }
                        Scalar::Timestamp(_) => {
                            saw_value = true;
                            numeric = false;
                        }
                        Scalar::Bool(_) | Scalar::Text(_) => {
                            saw_value = true;
                            numeric = false;
                            temporal = false;
                        }
                    }
                }
                if saw_value && numeric {
                    ColumnKind::Numeric
                } else if saw_value && temporal {
                    ColumnKind::Temporal
                } else {
                    ColumnKind::Categorical
                }
            })
            .collect()
    }

    /// Returns a copy limited to the first `n` rows (for prompt summaries).
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Renders the table as plain text, one line per row, tab-separated,
    /// with a header line. Used for prompt data summaries and CLI output.
    pub fn render_text(&self) -> String {
        let mut out = self
            .columns
            .iter()
            .map(|c| c.as_str().to_owned())
            .collect::<Vec<_>>()
            .join("\t");
        for row in &self.rows {
            out.push('\n');
            out.push_str(
                &row.iter()
                    .map(Scalar::to_text)
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Token accounting
// ---------------------------------------------------------------------------

/// Number of tokens consumed or budgeted in an LLM API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if this count is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for TokenCount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string (the wire format of both collaborators).
    #[must_use]
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> ColumnName {
        ColumnName::new(name).unwrap()
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let t = Table::new(
            vec![col("a"), col("b")],
            vec![vec![Scalar::Integer(1)]],
        );
        assert!(t.is_none());
    }

    #[test]
    fn classify_mixed_columns() {
        let t = Table::new(
            vec![col("region"), col("cost"), col("started"), col("note")],
            vec![
                vec![
                    Scalar::Text("A".into()),
                    Scalar::Integer(100),
                    Scalar::Timestamp(Timestamp::now()),
                    Scalar::Null,
                ],
                vec![
                    Scalar::Text("B".into()),
                    Scalar::Number(50.5),
                    Scalar::Null,
                    Scalar::Null,
                ],
            ],
        )
        .unwrap();
        assert_eq!(
            t.classify_columns(),
            vec![
                ColumnKind::Categorical,
                ColumnKind::Numeric,
                ColumnKind::Temporal,
                ColumnKind::Categorical,
            ]
        );
    }

    #[test]
    fn nulls_do_not_break_numeric_classification() {
        let t = Table::new(
            vec![col("n")],
            vec![
                vec![Scalar::Null],
                vec![Scalar::Integer(3)],
                vec![Scalar::Number(1.5)],
            ],
        )
        .unwrap();
        assert_eq!(t.classify_columns(), vec![ColumnKind::Numeric]);
    }

    #[test]
    fn scalar_serialises_to_plain_json() {
        let row = vec![
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Integer(7),
            Scalar::Number(2.5),
            Scalar::Text("x".into()),
        ];
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!([null, true, 7, 2.5, "x"]));
    }

    #[test]
    fn head_limits_rows_and_keeps_columns() {
        let t = Table::new(
            vec![col("a")],
            vec![
                vec![Scalar::Integer(1)],
                vec![Scalar::Integer(2)],
                vec![Scalar::Integer(3)],
            ],
        )
        .unwrap();
        let h = t.head(2);
        assert_eq!(h.row_count(), 2);
        assert_eq!(h.columns(), t.columns());
    }
}
