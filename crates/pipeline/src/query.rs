//! Query descriptors and the data-source schema catalog.
//!
//! A run carries one [`QueryDescriptor`] — either raw SQL text for a
//! relational engine or a declarative [`QueryPlan`] for a document store.
//! Both are opaque to the runner; only the data-source adapter interprets
//! them. The [`SchemaCatalog`] is the human-maintained description of the
//! data source that is embedded into query-generation prompts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CollectionName;

// ---------------------------------------------------------------------------
// Query descriptors
// ---------------------------------------------------------------------------

/// The query produced by the planning stage and consumed by the execution
/// stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "query", rename_all = "snake_case")]
pub enum QueryDescriptor {
    /// Textual SQL for a relational engine. Always begins with a query
    /// keyword (`SELECT` or `WITH`); the sanitizer guarantees this before a
    /// descriptor is built.
    Sql(String),
    /// Declarative filter plan for a document store.
    Plan(QueryPlan),
}

/// A declarative document-store query.
///
/// Mirrors the JSON structure the planning prompt requests from the model:
/// collection, field projection, filter predicates, ordering, and a row
/// limit. Unknown fields in model output are ignored during deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Name of the collection to query.
    pub collection: String,
    /// Fields to include in the result, in projection order. Empty means all
    /// fields, in first-seen order.
    #[serde(default)]
    pub select: Vec<String>,
    /// Filter predicates, all of which must hold.
    #[serde(default, rename = "where")]
    pub filters: Vec<FilterClause>,
    /// Sort order, applied in list order.
    #[serde(default)]
    pub order_by: Vec<OrderClause>,
    /// Maximum number of documents to return.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One filter predicate of a [`QueryPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Field the predicate applies to.
    pub field: String,
    /// Comparison operator.
    #[serde(rename = "operator")]
    pub op: FilterOp,
    /// Comparison value, as the JSON scalar the model produced.
    pub value: serde_json::Value,
}

/// Comparison operators supported by the document-store plan format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    /// Equality.
    #[serde(rename = "==")]
    Eq,
    /// Inequality.
    #[serde(rename = "!=")]
    Ne,
    /// Strictly less than.
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "<=")]
    Le,
    /// Strictly greater than.
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    Ge,
    /// Membership in a list of values.
    #[serde(rename = "in")]
    In,
    /// Array field contains the value.
    #[serde(rename = "array_contains")]
    ArrayContains,
}

/// One sort clause of a [`QueryPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderClause {
    /// Field to sort by.
    pub field: String,
    /// Sort direction; ascending when the model omits it.
    #[serde(default)]
    pub direction: SortDirection,
}

/// Sort direction for an [`OrderClause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

// ---------------------------------------------------------------------------
// Schema catalog
// ---------------------------------------------------------------------------

/// Declared scalar type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    String,
    /// Integer or floating-point.
    Number,
    /// Boolean flag.
    Boolean,
    /// UTC timestamp.
    Timestamp,
}

/// Declared fields of one collection or table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Field name to declared type. Sorted order is fine for prompts; the
    /// model is told names and types, not positions.
    pub fields: BTreeMap<String, FieldType>,
}

/// The data-source description embedded into query-generation and
/// validation prompts.
///
/// Maintained by the operator, not discovered; result tables may still carry
/// columns outside the catalog (e.g. SQL expression aliases).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection with its field declarations, replacing any previous
    /// entry of the same name.
    pub fn with_collection(
        mut self,
        name: CollectionName,
        fields: impl IntoIterator<Item = (String, FieldType)>,
    ) -> Self {
        self.collections.insert(
            name.as_str().to_owned(),
            CollectionSchema {
                fields: fields.into_iter().collect(),
            },
        );
        self
    }

    /// Returns `true` if the catalog declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Returns the declared collection names.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Renders the catalog as pretty-printed JSON for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        // Serialising a map of plain structs cannot fail.
        serde_json::to_string_pretty(&self.collections).unwrap_or_default()
    }
}
