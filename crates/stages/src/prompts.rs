//! Prompt templates for the stage collaborator calls.
//!
//! Kept in one place so the wording each stage sends can be reviewed and
//! versioned together. Every template that expects structure back tells the
//! model to respond with that structure only; the sanitizer still treats the
//! reply as untrusted.

use pipeline::Table;

/// `Columns: a, b` header plus a plain-text rendering of the first `rows`
/// rows, the summary format shared by the visualization and insight prompts.
pub fn data_summary(table: &Table, rows: usize) -> String {
    let columns = table
        .columns()
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Columns: {columns}\n\n{}", table.head(rows).render_text())
}

/// Asks for a declarative document-store query plan as strict JSON.
pub fn document_plan_prompt(question: &str, schema_json: &str) -> String {
    format!(
        r#"You are an expert document-database engineer. Your task is to convert a user's question into a structured query plan.

Given the following collection schema:
---
{schema_json}
---

Generate a JSON object that represents the query plan to answer the user's question: "{question}"

The JSON object must have the following structure:
{{
    "collection": "collection_name",
    "select": ["field1", "field2"],
    "where": [
        {{
            "field": "field_name",
            "operator": "==",
            "value": "some_value"
        }}
    ],
    "order_by": [
        {{
            "field": "field_name",
            "direction": "DESCENDING"
        }}
    ],
    "limit": 10
}}

- "collection" is the name of the collection to query.
- "select" is a list of fields to include in the result. If empty, all fields are returned.
- "where" is a list of conditions to filter the documents.
- "order_by" is a list of fields to sort the results by.
- "limit" is the maximum number of documents to return.

Only respond with the JSON object."#
    )
}

/// Asks for a single SQL query answering the question.
pub fn sql_plan_prompt(question: &str, schema_json: &str) -> String {
    format!(
        r#"You are an expert SQL engineer. Your task is to convert a user's question into a single SQL query.

Given the following table schema:
---
{schema_json}
---

Write one SQL query that answers the user's question: "{question}"

Only respond with the SQL query. Do not include any explanation."#
    )
}

/// Asks the model to check a generated SQL query against the schema and
/// either confirm it or supply a corrected query.
pub fn validate_sql_prompt(sql: &str, schema_json: &str) -> String {
    format!(
        r#"You are a careful SQL reviewer. Check the following query against the table schema and decide whether it is valid and answers only what the schema supports.

Table schema:
---
{schema_json}
---

Query to check:
---
{sql}
---

Respond with a JSON object only, in this structure:
{{
    "valid": true,
    "corrected_query": null,
    "issues": null
}}

If the query is invalid, set "valid" to false, put a corrected SQL query in "corrected_query", and describe the problems in "issues"."#
    )
}

/// Asks for a chart-type recommendation in a fixed two-line format.
pub fn visualization_prompt(question: &str, summary: &str) -> String {
    format!(
        r#"You are an AI assistant that recommends appropriate data visualizations. Based on the user's question and the query results, suggest the most suitable type of graph or chart.

**Available chart types:** bar, horizontal_bar, line, pie, scatter, none

**Analyze the following information:**

1.  **User's Question:** "{question}"
2.  **Query Result Summary (Column Names and First 3 Rows):**
    ---
    {summary}
    ---

**Your Task:**
Provide your response in the following format ONLY:

Recommended Visualization: [Chart type or "none"]
Reason: [Brief explanation for your recommendation]"#
    )
}

/// Asks for a chart title as a one-key JSON object.
pub fn chart_title_prompt(question: &str, columns: &[&str]) -> String {
    format!(
        "Based on the user's question '{question}' and the data columns '{}', \
         suggest a concise and professional chart 'title'. \
         Respond with a valid JSON object containing only the 'title' key.",
        columns.join(", ")
    )
}

/// Asks for a prose explanation of the result data.
pub fn insight_prompt(question: &str, summary: &str) -> String {
    format!(
        r#"You are an expert data analyst. Your task is to provide a clear, human-friendly explanation of the data returned from a user's query.

The user asked the following question:
"{question}"

The query returned the following data:
---
{summary}
---

Based on the user's question and the data, please provide a concise explanation of what the data means.
Focus on the key insights and patterns in the data.
You can also include policy implications, anomalies, or recommendations if you see any."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{ColumnName, Scalar};

    #[test]
    fn summary_lists_columns_and_limits_rows() {
        let table = Table::new(
            vec![
                ColumnName::new("region").unwrap(),
                ColumnName::new("cost").unwrap(),
            ],
            vec![
                vec![Scalar::Text("A".into()), Scalar::Integer(1)],
                vec![Scalar::Text("B".into()), Scalar::Integer(2)],
                vec![Scalar::Text("C".into()), Scalar::Integer(3)],
            ],
        )
        .unwrap();
        let summary = data_summary(&table, 2);
        assert!(summary.starts_with("Columns: region, cost"));
        assert!(summary.contains('A'));
        assert!(!summary.contains('C'));
    }
}
