//! Chart kinds and rendering-ready payload shaping.
//!
//! The chart kind is a closed enumeration handled exhaustively — an
//! unrecognised kind cannot reach the shaping dispatch; the only place free
//! text is mapped into [`ChartKind`] is [`ChartKind::parse`], used where
//! model output enters the system.
//!
//! Shaping is pure: given a classified [`Table`] and a kind, it either
//! produces the payload shape the renderer expects or a descriptive
//! [`ChartShapeError`]. Empty tables and [`ChartKind::None`] short-circuit to
//! the fixed no-data payload before any per-kind logic runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ColumnKind, Scalar, Table};

/// Fixed message carried by the no-data payload.
pub const NO_DATA_MESSAGE: &str = "No data available to format.";

// ---------------------------------------------------------------------------
// Chart kinds
// ---------------------------------------------------------------------------

/// The closed set of supported visualization shapes a run may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Vertical bar chart.
    Bar,
    /// Horizontal bar chart (same data shape as [`ChartKind::Bar`]).
    HorizontalBar,
    /// Line chart.
    Line,
    /// Pie chart.
    Pie,
    /// Scatter plot.
    Scatter,
    /// No visualization for this run.
    None,
}

impl ChartKind {
    /// Parses a recommendation token into a kind.
    ///
    /// Tolerates surrounding whitespace, quotes, trailing punctuation, and
    /// case; returns `None` for anything outside the closed set so the
    /// caller decides how to treat unrecognised output.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let t = token
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '*')
            .to_lowercase();
        match t.as_str() {
            "bar" => Some(ChartKind::Bar),
            "horizontal_bar" | "horizontal bar" => Some(ChartKind::HorizontalBar),
            "line" => Some(ChartKind::Line),
            "pie" => Some(ChartKind::Pie),
            "scatter" => Some(ChartKind::Scatter),
            "none" => Some(ChartKind::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChartKind::Bar => "bar",
            ChartKind::HorizontalBar => "horizontal_bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
            ChartKind::None => "none",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

/// Presentation options attached to a shaped chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    /// Chart title. LLM-suggested when available, otherwise the raw
    /// question text.
    pub title: String,
}

/// One named series of values, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Values down the rows of one numeric column.
    pub data: Vec<Scalar>,
    /// Series label — the source column name.
    pub label: String,
}

/// Data portion of a bar or horizontal bar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    /// Category labels from the first categorical column, row order
    /// preserved.
    pub labels: Vec<String>,
    /// One series per numeric column.
    pub values: Vec<Series>,
}

/// Data portion of a line chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    /// X-axis values from the first column, rendered as text.
    #[serde(rename = "xValues")]
    pub x_values: Vec<String>,
    /// One series per numeric column.
    #[serde(rename = "yValues")]
    pub y_values: Vec<Series>,
}

/// One slice of a pie chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    /// Zero-based row index of the slice.
    pub id: usize,
    /// Slice value from the numeric column.
    pub value: Scalar,
    /// Slice label from the categorical column.
    pub label: String,
}

/// One point of a scatter plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// X value from the first numeric column.
    pub x: Scalar,
    /// Y value from the second numeric column.
    pub y: Scalar,
    /// Zero-based row index of the point.
    pub id: usize,
}

/// One series of scatter points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterSeries {
    /// Series label; a single `"Dataset"` series is produced today.
    pub label: String,
    /// Points in row order.
    pub data: Vec<ScatterPoint>,
}

/// Data portion of a scatter plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterData {
    /// Point series.
    pub series: Vec<ScatterSeries>,
}

/// A rendering-ready chart payload, shaped per kind.
///
/// `Unavailable` is the structured sentinel for both the no-data path and
/// domain-shape failures; the run is never aborted for either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartPayload {
    /// Vertical bar chart payload.
    Bar {
        /// Labels and series.
        data: CategoryData,
        /// Title options.
        options: ChartOptions,
    },
    /// Horizontal bar chart payload.
    HorizontalBar {
        /// Labels and series.
        data: CategoryData,
        /// Title options.
        options: ChartOptions,
    },
    /// Line chart payload.
    Line {
        /// X values and series.
        data: LineData,
        /// Title options.
        options: ChartOptions,
    },
    /// Pie chart payload.
    Pie {
        /// One slice per row.
        data: Vec<PieSlice>,
        /// Title options.
        options: ChartOptions,
    },
    /// Scatter plot payload.
    Scatter {
        /// Point series.
        data: ScatterData,
        /// Title options.
        options: ChartOptions,
    },
    /// No renderable chart for this run.
    Unavailable {
        /// Why no chart is available (fixed no-data message or the shape
        /// violation description).
        error: String,
    },
}

impl ChartPayload {
    /// The fixed payload for runs with no data to render.
    pub fn no_data() -> Self {
        ChartPayload::Unavailable {
            error: NO_DATA_MESSAGE.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shaping errors
// ---------------------------------------------------------------------------

/// The result table's column shape does not satisfy the requested kind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChartShapeError {
    /// Bar charts need a label column and at least one value column.
    #[error("bar chart data must have at least one categorical column and at least one numeric column")]
    BarColumns,

    /// Line charts need at least one numeric y-axis column.
    #[error("line chart data must have at least one numeric y-axis column")]
    LineColumns,

    /// Pie charts need exactly one categorical and exactly one numeric
    /// column.
    #[error("pie chart data must have exactly one categorical column and exactly one numeric column")]
    PieColumns,

    /// Scatter plots need two numeric columns for x and y.
    #[error("scatter plot data must have at least two numeric columns")]
    ScatterColumns,
}

// ---------------------------------------------------------------------------
// Shaping
// ---------------------------------------------------------------------------

/// Shapes `table` into the payload required by `kind`.
///
/// [`ChartKind::None`] and empty tables short-circuit to the fixed no-data
/// payload without touching per-kind logic. Shape violations are returned as
/// [`ChartShapeError`]; callers surface them inside
/// [`ChartPayload::Unavailable`] rather than failing the run.
pub fn shape_chart(
    kind: ChartKind,
    table: &Table,
    options: ChartOptions,
) -> Result<ChartPayload, ChartShapeError> {
    if kind == ChartKind::None || table.is_empty() {
        return Ok(ChartPayload::no_data());
    }
    let kinds = table.classify_columns();
    match kind {
        ChartKind::Bar => Ok(ChartPayload::Bar {
            data: shape_categories(table, &kinds)?,
            options,
        }),
        ChartKind::HorizontalBar => Ok(ChartPayload::HorizontalBar {
            data: shape_categories(table, &kinds)?,
            options,
        }),
        ChartKind::Line => Ok(ChartPayload::Line {
            data: shape_line(table, &kinds)?,
            options,
        }),
        ChartKind::Pie => Ok(ChartPayload::Pie {
            data: shape_pie(table, &kinds)?,
            options,
        }),
        ChartKind::Scatter => Ok(ChartPayload::Scatter {
            data: shape_scatter(table, &kinds)?,
            options,
        }),
        ChartKind::None => unreachable!("handled by the no-data short-circuit"),
    }
}

fn numeric_indices(kinds: &[ColumnKind]) -> Vec<usize> {
    kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == ColumnKind::Numeric)
        .map(|(i, _)| i)
        .collect()
}

fn categorical_indices(kinds: &[ColumnKind]) -> Vec<usize> {
    kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == ColumnKind::Categorical)
        .map(|(i, _)| i)
        .collect()
}

fn series_for(table: &Table, index: usize) -> Series {
    Series {
        data: table.column_values(index).cloned().collect(),
        label: table.columns()[index].as_str().to_owned(),
    }
}

fn shape_categories(table: &Table, kinds: &[ColumnKind]) -> Result<CategoryData, ChartShapeError> {
    let cats = categorical_indices(kinds);
    let nums = numeric_indices(kinds);
    let label_col = *cats.first().ok_or(ChartShapeError::BarColumns)?;
    if nums.is_empty() {
        return Err(ChartShapeError::BarColumns);
    }
    Ok(CategoryData {
        labels: table.column_values(label_col).map(Scalar::to_text).collect(),
        values: nums.iter().map(|&i| series_for(table, i)).collect(),
    })
}

fn shape_line(table: &Table, kinds: &[ColumnKind]) -> Result<LineData, ChartShapeError> {
    let nums = numeric_indices(kinds);
    if nums.is_empty() {
        return Err(ChartShapeError::LineColumns);
    }
    // X-axis is the first column regardless of its type, rendered as text.
    Ok(LineData {
        x_values: table.column_values(0).map(Scalar::to_text).collect(),
        y_values: nums.iter().map(|&i| series_for(table, i)).collect(),
    })
}

fn shape_pie(table: &Table, kinds: &[ColumnKind]) -> Result<Vec<PieSlice>, ChartShapeError> {
    let cats = categorical_indices(kinds);
    let nums = numeric_indices(kinds);
    if cats.len() != 1 || nums.len() != 1 {
        return Err(ChartShapeError::PieColumns);
    }
    let (label_col, value_col) = (cats[0], nums[0]);
    Ok(table
        .rows()
        .iter()
        .enumerate()
        .map(|(id, row)| PieSlice {
            id,
            value: row[value_col].clone(),
            label: row[label_col].to_text(),
        })
        .collect())
}

fn shape_scatter(table: &Table, kinds: &[ColumnKind]) -> Result<ScatterData, ChartShapeError> {
    let nums = numeric_indices(kinds);
    if nums.len() < 2 {
        return Err(ChartShapeError::ScatterColumns);
    }
    let (x_col, y_col) = (nums[0], nums[1]);
    let points = table
        .rows()
        .iter()
        .enumerate()
        .map(|(id, row)| ScatterPoint {
            x: row[x_col].clone(),
            y: row[y_col].clone(),
            id,
        })
        .collect();
    Ok(ScatterData {
        series: vec![ScatterSeries {
            label: "Dataset".to_owned(),
            data: points,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnName;

    fn col(name: &str) -> ColumnName {
        ColumnName::new(name).unwrap()
    }

    fn options() -> ChartOptions {
        ChartOptions {
            title: "t".to_owned(),
        }
    }

    fn region_cost_table() -> Table {
        Table::new(
            vec![col("region"), col("cost")],
            vec![
                vec![Scalar::Text("A".into()), Scalar::Integer(100)],
                vec![Scalar::Text("B".into()), Scalar::Integer(50)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn parse_accepts_the_closed_set_only() {
        assert_eq!(ChartKind::parse(" Bar "), Some(ChartKind::Bar));
        assert_eq!(ChartKind::parse("horizontal_bar"), Some(ChartKind::HorizontalBar));
        assert_eq!(ChartKind::parse("\"none\""), Some(ChartKind::None));
        assert_eq!(ChartKind::parse("treemap"), None);
        assert_eq!(ChartKind::parse(""), None);
    }

    #[test]
    fn bar_payload_matches_renderer_contract() {
        let payload = shape_chart(ChartKind::Bar, &region_cost_table(), options()).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"]["labels"], serde_json::json!(["A", "B"]));
        assert_eq!(
            json["data"]["values"],
            serde_json::json!([{"data": [100, 50], "label": "cost"}])
        );
    }

    #[test]
    fn bar_shaping_is_idempotent() {
        let table = region_cost_table();
        let a = shape_chart(ChartKind::Bar, &table, options()).unwrap();
        let b = shape_chart(ChartKind::Bar, &table, options()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bar_without_numeric_column_fails() {
        let table = Table::new(
            vec![col("region")],
            vec![vec![Scalar::Text("A".into())]],
        )
        .unwrap();
        let err = shape_chart(ChartKind::Bar, &table, options()).unwrap_err();
        assert_eq!(err, ChartShapeError::BarColumns);
    }

    #[test]
    fn empty_table_short_circuits_for_any_kind() {
        for kind in [
            ChartKind::Bar,
            ChartKind::HorizontalBar,
            ChartKind::Line,
            ChartKind::Pie,
            ChartKind::Scatter,
            ChartKind::None,
        ] {
            let payload = shape_chart(kind, &Table::empty(), options()).unwrap();
            assert_eq!(payload, ChartPayload::no_data());
        }
    }

    #[test]
    fn line_uses_first_column_as_text_axis() {
        let table = Table::new(
            vec![col("month"), col("cost")],
            vec![
                vec![Scalar::Integer(1), Scalar::Number(10.0)],
                vec![Scalar::Integer(2), Scalar::Number(20.0)],
            ],
        )
        .unwrap();
        let payload = shape_chart(ChartKind::Line, &table, options()).unwrap();
        match payload {
            ChartPayload::Line { data, .. } => {
                assert_eq!(data.x_values, vec!["1", "2"]);
                // The first column is numeric so it also appears as a series.
                assert_eq!(data.y_values.len(), 2);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn line_without_numeric_column_fails() {
        let table = Table::new(
            vec![col("region")],
            vec![vec![Scalar::Text("A".into())]],
        )
        .unwrap();
        let err = shape_chart(ChartKind::Line, &table, options()).unwrap_err();
        assert_eq!(err, ChartShapeError::LineColumns);
    }

    #[test]
    fn pie_produces_one_slice_per_row_in_order() {
        let payload = shape_chart(ChartKind::Pie, &region_cost_table(), options()).unwrap();
        match payload {
            ChartPayload::Pie { data, .. } => {
                assert_eq!(data.len(), 2);
                assert_eq!(data[0].id, 0);
                assert_eq!(data[0].label, "A");
                assert_eq!(data[0].value, Scalar::Integer(100));
                assert_eq!(data[1].id, 1);
                assert_eq!(data[1].label, "B");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn pie_rejects_zero_or_many_numeric_columns() {
        let no_numeric = Table::new(
            vec![col("region")],
            vec![vec![Scalar::Text("A".into())]],
        )
        .unwrap();
        let two_numeric = Table::new(
            vec![col("region"), col("cost"), col("abc")],
            vec![vec![
                Scalar::Text("A".into()),
                Scalar::Integer(1),
                Scalar::Integer(2),
            ]],
        )
        .unwrap();
        assert_eq!(
            shape_chart(ChartKind::Pie, &no_numeric, options()).unwrap_err(),
            ChartShapeError::PieColumns
        );
        assert_eq!(
            shape_chart(ChartKind::Pie, &two_numeric, options()).unwrap_err(),
            ChartShapeError::PieColumns
        );
    }

    #[test]
    fn scatter_uses_first_two_numeric_columns_by_order() {
        let table = Table::new(
            vec![col("label"), col("abc"), col("cost"), col("rating")],
            vec![vec![
                Scalar::Text("p".into()),
                Scalar::Number(1.0),
                Scalar::Number(2.0),
                Scalar::Number(3.0),
            ]],
        )
        .unwrap();
        let payload = shape_chart(ChartKind::Scatter, &table, options()).unwrap();
        match payload {
            ChartPayload::Scatter { data, .. } => {
                let point = &data.series[0].data[0];
                assert_eq!(point.x, Scalar::Number(1.0));
                assert_eq!(point.y, Scalar::Number(2.0));
                assert_eq!(point.id, 0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn scatter_rejects_fewer_than_two_numeric_columns() {
        let table = region_cost_table();
        let err = shape_chart(ChartKind::Scatter, &table, options()).unwrap_err();
        assert_eq!(err, ChartShapeError::ScatterColumns);
    }
}
