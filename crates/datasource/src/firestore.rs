//! Firestore data-source adapter.
//!
//! Translates a declarative [`QueryPlan`] into the Firestore REST
//! `runQuery` structured-query format, posts it, and decodes the returned
//! documents into a [`Table`]. The translation and decoding are pure
//! functions so they can be tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use pipeline::{
    ColumnName, DataSource, DataSourceError, FilterClause, FilterOp, QueryDescriptor, QueryPlan,
    Scalar, SortDirection, Table, Timestamp,
};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for [`FirestoreSource`].
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Google Cloud project that owns the database.
    pub project_id: String,
    /// Database identifier within the project.
    pub database: String,
    /// Service base URL. Overridable so tests and proxies can redirect the
    /// adapter.
    pub base_url: String,
    /// Bearer token for the `Authorization` header, when the deployment
    /// requires one.
    pub auth_token: Option<String>,
    /// Per-call deadline.
    pub timeout: Duration,
}

impl FirestoreConfig {
    /// Creates a config for the default database of `project_id`.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan translation
// ---------------------------------------------------------------------------

fn filter_op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "EQUAL",
        FilterOp::Ne => "NOT_EQUAL",
        FilterOp::Lt => "LESS_THAN",
        FilterOp::Le => "LESS_THAN_OR_EQUAL",
        FilterOp::Gt => "GREATER_THAN",
        FilterOp::Ge => "GREATER_THAN_OR_EQUAL",
        FilterOp::In => "IN",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
    }
}

fn encode_value(value: &Value) -> Result<Value, DataSourceError> {
    match value {
        Value::Null => Ok(json!({ "nullValue": null })),
        Value::Bool(b) => Ok(json!({ "booleanValue": b })),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Firestore carries 64-bit integers as decimal strings.
                Ok(json!({ "integerValue": i.to_string() }))
            } else {
                Ok(json!({ "doubleValue": n.as_f64() }))
            }
        }
        Value::String(s) => Ok(json!({ "stringValue": s })),
        Value::Array(items) => {
            let values = items
                .iter()
                .map(encode_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({ "arrayValue": { "values": values } }))
        }
        Value::Object(_) => Err(DataSourceError::UnsupportedQuery {
            message: "filter values must be scalars or arrays of scalars".to_owned(),
        }),
    }
}

fn encode_filter(clause: &FilterClause) -> Result<Value, DataSourceError> {
    Ok(json!({
        "fieldFilter": {
            "field": { "fieldPath": clause.field },
            "op": filter_op_name(clause.op),
            "value": encode_value(&clause.value)?,
        }
    }))
}

/// Builds the `runQuery` request body for a plan.
///
/// Fails with [`DataSourceError::UnsupportedQuery`] when the plan names no
/// collection or uses a filter value Firestore cannot compare against.
pub fn build_run_query(plan: &QueryPlan) -> Result<Value, DataSourceError> {
    if plan.collection.trim().is_empty() {
        return Err(DataSourceError::UnsupportedQuery {
            message: "collection field is missing from the query plan".to_owned(),
        });
    }

    let mut structured = json!({
        "from": [{ "collectionId": plan.collection }],
    });

    if !plan.select.is_empty() {
        let fields: Vec<Value> = plan
            .select
            .iter()
            .map(|f| json!({ "fieldPath": f }))
            .collect();
        structured["select"] = json!({ "fields": fields });
    }

    match plan.filters.len() {
        0 => {}
        1 => {
            structured["where"] = encode_filter(&plan.filters[0])?;
        }
        _ => {
            let filters = plan
                .filters
                .iter()
                .map(encode_filter)
                .collect::<Result<Vec<_>, _>>()?;
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            });
        }
    }

    if !plan.order_by.is_empty() {
        let clauses: Vec<Value> = plan
            .order_by
            .iter()
            .map(|clause| {
                let direction = match clause.direction {
                    SortDirection::Ascending => "ASCENDING",
                    SortDirection::Descending => "DESCENDING",
                };
                json!({
                    "field": { "fieldPath": clause.field },
                    "direction": direction,
                })
            })
            .collect();
        structured["orderBy"] = Value::Array(clauses);
    }

    if let Some(limit) = plan.limit {
        structured["limit"] = json!(limit);
    }

    Ok(json!({ "structuredQuery": structured }))
}

// ---------------------------------------------------------------------------
// Document decoding
// ---------------------------------------------------------------------------

fn decode_scalar(value: &Value) -> Scalar {
    let Some(obj) = value.as_object() else {
        return Scalar::Null;
    };
    if let Some((kind, inner)) = obj.iter().next() {
        match kind.as_str() {
            "nullValue" => Scalar::Null,
            "booleanValue" => inner.as_bool().map_or(Scalar::Null, Scalar::Bool),
            "integerValue" => inner
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .or_else(|| inner.as_i64())
                .map_or(Scalar::Null, Scalar::Integer),
            "doubleValue" => inner.as_f64().map_or(Scalar::Null, Scalar::Number),
            "stringValue" => inner
                .as_str()
                .map_or(Scalar::Null, |s| Scalar::Text(s.to_owned())),
            "timestampValue" => match inner.as_str() {
                Some(s) => Timestamp::parse_rfc3339(s)
                    .map(Scalar::Timestamp)
                    .unwrap_or_else(|| Scalar::Text(s.to_owned())),
                None => Scalar::Null,
            },
            // Arrays and maps have no chart meaning; carry them as JSON
            // text so the row shape stays rectangular.
            _ => Scalar::Text(inner.to_string()),
        }
    } else {
        Scalar::Null
    }
}

/// Decodes a `runQuery` response body (an array of result entries) into a
/// table.
///
/// Column order follows the plan's projection when one is present, and
/// first-seen field order across documents otherwise. Fields a document
/// lacks decode as [`Scalar::Null`].
pub fn decode_documents(plan: &QueryPlan, entries: &[Value]) -> Result<Table, DataSourceError> {
    let documents: Vec<&serde_json::Map<String, Value>> = entries
        .iter()
        .filter_map(|entry| entry.get("document"))
        .filter_map(|doc| doc.get("fields"))
        .filter_map(Value::as_object)
        .collect();

    let field_names: Vec<String> = if plan.select.is_empty() {
        let mut seen = Vec::new();
        for fields in &documents {
            for name in fields.keys() {
                if !seen.contains(name) {
                    seen.push(name.clone());
                }
            }
        }
        seen
    } else {
        plan.select.clone()
    };

    if field_names.is_empty() {
        return Ok(Table::empty());
    }

    let columns = field_names
        .iter()
        .map(|name| ColumnName::new(name.as_str()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| DataSourceError::Decode {
            message: "document field names must be non-blank".to_owned(),
        })?;

    let rows: Vec<Vec<Scalar>> = documents
        .iter()
        .map(|fields| {
            field_names
                .iter()
                .map(|name| fields.get(name).map_or(Scalar::Null, decode_scalar))
                .collect()
        })
        .collect();

    Table::new(columns, rows).ok_or_else(|| DataSourceError::Decode {
        message: "decoded rows were not rectangular".to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// [`DataSource`] over the Firestore REST `runQuery` endpoint.
pub struct FirestoreSource {
    config: FirestoreConfig,
    client: reqwest::Client,
}

impl FirestoreSource {
    /// Creates a source with its own HTTP client.
    pub fn new(config: FirestoreConfig) -> Result<Self, DataSourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| DataSourceError::Unavailable {
                message: format!("could not build HTTP client: {err}"),
            })?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents:runQuery",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            self.config.database,
        )
    }

    async fn post_query(&self, body: &Value) -> Result<Vec<Value>, DataSourceError> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| DataSourceError::Unavailable {
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DataSourceError::QueryRejected {
                message: format!("Firestore returned {status}: {message}"),
            });
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|err| DataSourceError::Decode {
                message: format!("could not decode response body: {err}"),
            })
    }
}

#[async_trait]
impl DataSource for FirestoreSource {
    async fn run(&self, query: &QueryDescriptor) -> Result<Table, DataSourceError> {
        let plan = match query {
            QueryDescriptor::Plan(plan) => plan,
            QueryDescriptor::Sql(_) => {
                return Err(DataSourceError::UnsupportedQuery {
                    message: "Firestore adapter executes document plans, not SQL text".to_owned(),
                });
            }
        };
        let body = build_run_query(plan)?;
        debug!(collection = %plan.collection, "running Firestore query");
        let entries = self.post_query(&body).await?;
        decode_documents(plan, &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::OrderClause;

    fn plan(json_text: &str) -> QueryPlan {
        serde_json::from_str(json_text).unwrap()
    }

    #[test]
    fn run_query_body_carries_projection_filters_and_order() {
        let plan = plan(
            r#"{
                "collection": "flood_control_projects",
                "select": ["region", "contract_cost"],
                "where": [
                    {"field": "status", "operator": "==", "value": "Completed"},
                    {"field": "contract_cost", "operator": ">", "value": 1000000}
                ],
                "order_by": [
                    {"field": "contract_cost", "direction": "DESCENDING"}
                ],
                "limit": 5
            }"#,
        );
        let body = build_run_query(&plan).unwrap();
        let query = &body["structuredQuery"];
        assert_eq!(query["from"][0]["collectionId"], "flood_control_projects");
        assert_eq!(query["select"]["fields"][1]["fieldPath"], "contract_cost");
        let composite = &query["where"]["compositeFilter"];
        assert_eq!(composite["op"], "AND");
        assert_eq!(
            composite["filters"][0]["fieldFilter"]["op"],
            "EQUAL"
        );
        assert_eq!(
            composite["filters"][1]["fieldFilter"]["value"]["integerValue"],
            "1000000"
        );
        assert_eq!(query["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(query["limit"], 5);
    }

    #[test]
    fn single_filter_is_a_bare_field_filter() {
        let plan = plan(
            r#"{
                "collection": "cpes_projects",
                "where": [{"field": "cpes_rating", "operator": ">=", "value": 4.0}]
            }"#,
        );
        let body = build_run_query(&plan).unwrap();
        let filter = &body["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(filter["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(filter["value"]["doubleValue"], 4.0);
    }

    #[test]
    fn in_filter_encodes_an_array_value() {
        let plan = plan(
            r#"{
                "collection": "cpes_projects",
                "where": [{"field": "region", "operator": "in", "value": ["NCR", "Region IV-A"]}]
            }"#,
        );
        let body = build_run_query(&plan).unwrap();
        let value = &body["structuredQuery"]["where"]["fieldFilter"]["value"];
        assert_eq!(value["arrayValue"]["values"][0]["stringValue"], "NCR");
    }

    #[test]
    fn blank_collection_is_rejected() {
        let plan = QueryPlan {
            collection: "  ".into(),
            select: vec![],
            filters: vec![],
            order_by: vec![OrderClause {
                field: "x".into(),
                direction: SortDirection::Ascending,
            }],
            limit: None,
        };
        let err = build_run_query(&plan).unwrap_err();
        assert!(matches!(err, DataSourceError::UnsupportedQuery { .. }));
    }

    #[test]
    fn object_filter_value_is_rejected() {
        let plan = plan(
            r#"{
                "collection": "cpes_projects",
                "where": [{"field": "meta", "operator": "==", "value": {"nested": true}}]
            }"#,
        );
        let err = build_run_query(&plan).unwrap_err();
        assert!(matches!(err, DataSourceError::UnsupportedQuery { .. }));
    }

    #[test]
    fn documents_decode_in_projection_order_with_nulls_for_gaps() {
        let plan = plan(
            r#"{"collection": "flood_control_projects", "select": ["region", "contract_cost"]}"#,
        );
        let entries = vec![
            json!({
                "document": {
                    "name": "projects/p/databases/(default)/documents/flood_control_projects/a",
                    "fields": {
                        "contract_cost": {"integerValue": "100"},
                        "region": {"stringValue": "NCR"}
                    }
                }
            }),
            json!({
                "document": {
                    "fields": { "region": {"stringValue": "CAR"} }
                }
            }),
            json!({ "readTime": "2026-01-01T00:00:00Z" }),
        ];
        let table = decode_documents(&plan, &entries).unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["region", "contract_cost"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0][1], Scalar::Integer(100));
        assert_eq!(table.rows()[1][1], Scalar::Null);
    }

    #[test]
    fn unprojected_decode_uses_first_seen_field_order() {
        // Wire order is not alphabetical; the column order must follow it,
        // since chart shaping binds to "the first column" by position.
        let plan = plan(r#"{"collection": "flood_control_projects"}"#);
        let entries = vec![
            json!({
                "document": {
                    "fields": {
                        "region": {"stringValue": "NCR"},
                        "contract_cost": {"integerValue": "100"}
                    }
                }
            }),
            json!({
                "document": {
                    "fields": {
                        "region": {"stringValue": "CAR"},
                        "contract_cost": {"integerValue": "50"},
                        "abc": {"integerValue": "60"}
                    }
                }
            }),
        ];
        let table = decode_documents(&plan, &entries).unwrap();
        let names: Vec<&str> = table.columns().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["region", "contract_cost", "abc"]);
        assert_eq!(table.rows()[0][0], Scalar::Text("NCR".into()));
        assert_eq!(table.rows()[0][2], Scalar::Null);
        assert_eq!(table.rows()[1][1], Scalar::Integer(50));
    }

    #[test]
    fn unprojected_decode_handles_mixed_scalar_kinds() {
        let plan = plan(r#"{"collection": "cpes_projects"}"#);
        let entries = vec![json!({
            "document": {
                "fields": {
                    "cpes_rating": {"doubleValue": 4.5},
                    "completed": {"booleanValue": true},
                    "updated_at": {"timestampValue": "2026-03-01T12:00:00Z"}
                }
            }
        })];
        let table = decode_documents(&plan, &entries).unwrap();
        assert_eq!(table.column_count(), 3);
        let row = &table.rows()[0];
        assert_eq!(row[0], Scalar::Number(4.5));
        assert_eq!(row[1], Scalar::Bool(true));
        assert!(matches!(row[2], Scalar::Timestamp(_)));
    }

    #[test]
    fn empty_response_is_an_empty_table() {
        let plan = plan(r#"{"collection": "cpes_projects"}"#);
        let table = decode_documents(&plan, &[]).unwrap();
        assert!(table.is_empty());
    }
}
