//! Plain-text report rendering for one completed run.

use pipeline::{QueryDescriptor, RunState};

const BANNER: &str = "==================================================";
const RULE: &str = "--------------------------------------------------";

/// Renders the final run state as a sectioned terminal report.
pub fn render_report(state: &RunState) -> String {
    let mut out = String::new();
    out.push_str(&format!("{BANNER}\n--- RUN COMPLETE ---\n{BANNER}\n\n"));

    if let Some(failure) = state.failure() {
        out.push_str(&format!("An error occurred during execution: {failure}\n\n"));
    }

    out.push_str("## Query:\n\n");
    match state.query() {
        Some(QueryDescriptor::Sql(sql)) => {
            out.push_str(sql);
            out.push('\n');
        }
        Some(QueryDescriptor::Plan(plan)) => {
            out.push_str(&serde_json::to_string_pretty(plan).unwrap_or_default());
            out.push('\n');
        }
        None => out.push_str("No query was produced.\n"),
    }

    out.push_str(&format!("\n{RULE}\n\n## Data Result:\n\n"));
    if state.rows().is_empty() {
        out.push_str("No data was returned from the query.\n");
    } else {
        out.push_str(&state.rows().render_text());
        out.push('\n');
    }

    out.push_str(&format!("\n{RULE}\n\n## Visualization Recommendation:\n\n"));
    out.push_str(&format!("Recommended Chart Type: {}\n", state.chart_kind()));

    out.push_str(&format!("\n{RULE}\n\n## Chart-Ready JSON Data:\n\n"));
    match state.chart_payload() {
        Some(payload) => {
            out.push_str(&serde_json::to_string_pretty(payload).unwrap_or_default());
            out.push('\n');
        }
        None => out.push_str("N/A\n"),
    }

    out.push_str(&format!("\n{BANNER}\n\n## Insight:\n\n"));
    out.push_str(state.narrative().unwrap_or("N/A"));
    out.push_str(&format!("\n\n{BANNER}\n"));
    out
}
