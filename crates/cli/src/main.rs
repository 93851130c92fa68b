//! DataSight CLI entry point.
//!
//! This binary is the composition root for the entire system.
//! Responsibilities:
//!
//! 1. **Parse configuration** — load [`config::RuntimeConfig`] from the
//!    environment and validate it before any collaborator exists.
//! 2. **Wire observability** — configure `tracing-subscriber` with an
//!    env-filter layer. All `tracing` spans and structured events emitted by
//!    every crate in the workspace flow through this layer.
//! 3. **Construct infrastructure** — create the Gemini providers and the
//!    selected data-source adapter, and inject them into the pipeline
//!    builder matching the backend family.
//! 4. **Run** — execute one question from the command line, either as a
//!    sectioned terminal report or (with `--stream`) as the raw SSE frame
//!    sequence an HTTP layer would forward.

mod config;
mod report;

use std::env;
use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use datasource::{FirestoreConfig, FirestoreSource, SqliteSource};
use llm::{GeminiConfig, GeminiProvider};
use pipeline::{
    CollectionName, DataSource, FieldType, LlmProvider, ModelName, Question, SchemaCatalog,
};
use stages::{document_pipeline, relational_pipeline, PipelineExecutor};
use transport::SseFrames;

use config::{Backend, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (stream_mode, question) = parse_args(env::args().skip(1).collect())?;
    let config = RuntimeConfig::from_env()?;
    info!(model = %config.model, backend = ?config.backend, "configuration loaded");
    let executor = build_executor(&config)?;

    if stream_mode {
        stream_run(executor, question).await
    } else {
        report_run(executor, question).await
    }
}

fn parse_args(mut args: Vec<String>) -> Result<(bool, Question)> {
    let stream_mode = args.first().map(String::as_str) == Some("--stream");
    if stream_mode {
        args.remove(0);
    }
    let text = args.join(" ");
    match Question::new(text) {
        Some(question) => Ok((stream_mode, question)),
        None => bail!("usage: datasight [--stream] <question>"),
    }
}

fn gemini(api_key: &str, model: &ModelName) -> Result<Arc<dyn LlmProvider>> {
    let provider = GeminiProvider::new(GeminiConfig::new(api_key, model.clone()))
        .context("could not construct the Gemini provider")?;
    Ok(Arc::new(provider))
}

fn build_executor(config: &RuntimeConfig) -> Result<PipelineExecutor> {
    let llm = gemini(&config.api_key, &config.model)?;
    let helper = gemini(&config.api_key, &config.helper_model)?;
    let schema = default_catalog();

    match &config.backend {
        Backend::Sqlite(path) => {
            let source = SqliteSource::open(path)
                .with_context(|| format!("could not open SQLite database {}", path.display()))?;
            let source: Arc<dyn DataSource> = Arc::new(source);
            Ok(relational_pipeline(llm, helper, source, schema))
        }
        Backend::Firestore(project) => {
            let source = FirestoreSource::new(FirestoreConfig::new(project.clone()))
                .context("could not construct the Firestore adapter")?;
            let source: Arc<dyn DataSource> = Arc::new(source);
            Ok(document_pipeline(llm, helper, source, schema))
        }
    }
}

async fn report_run(executor: PipelineExecutor, question: Question) -> Result<()> {
    let state = executor
        .run(question)
        .await
        .context("pipeline run aborted")?;
    println!("{}", report::render_report(&state));
    Ok(())
}

async fn stream_run(executor: PipelineExecutor, question: Question) -> Result<()> {
    let mut frames = SseFrames::new(Arc::new(executor).stream(question));
    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next_frame().await {
        stdout.write_all(frame.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

/// The operator-maintained description of the public-works data source.
fn default_catalog() -> SchemaCatalog {
    let field = |name: &str, ty: FieldType| (name.to_owned(), ty);
    SchemaCatalog::new()
        .with_collection(
            CollectionName::new("flood_control_projects").unwrap(),
            vec![
                field("project_name", FieldType::String),
                field("implementing_office", FieldType::String),
                field("contractor", FieldType::String),
                field("contract_cost", FieldType::Number),
                field("abc", FieldType::Number),
                field("region", FieldType::String),
                field("status", FieldType::String),
                field("date_started", FieldType::Timestamp),
                field("date_completed", FieldType::Timestamp),
            ],
        )
        .with_collection(
            CollectionName::new("cpes_projects").unwrap(),
            vec![
                field("project_name", FieldType::String),
                field("contractor", FieldType::String),
                field("cpes_rating", FieldType::Number),
            ],
        )
        .with_collection(
            CollectionName::new("contractor_name_mapping").unwrap(),
            vec![
                field("old_contractor_name", FieldType::String),
                field("new_contractor_name", FieldType::String),
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_without_a_question_are_rejected() {
        assert!(parse_args(vec![]).is_err());
        assert!(parse_args(vec!["--stream".into()]).is_err());
    }

    #[test]
    fn stream_flag_is_split_from_the_question() {
        let (stream, question) = parse_args(vec![
            "--stream".into(),
            "top".into(),
            "regions?".into(),
        ])
        .unwrap();
        assert!(stream);
        assert_eq!(question.as_str(), "top regions?");
    }

    #[test]
    fn default_catalog_declares_the_three_collections() {
        let catalog = default_catalog();
        assert!(catalog.contains("flood_control_projects"));
        assert!(catalog.contains("cpes_projects"));
        assert!(catalog.contains("contractor_name_mapping"));
    }
}
