//! Environment-backed runtime configuration.
//!
//! All knobs come from environment variables so the binary runs unchanged in
//! a shell, a container, or a service manager. Invalid configuration fails
//! fast here, before any collaborator is constructed.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use pipeline::ModelName;

/// API key for the Gemini provider. Required.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
/// Primary model (planning, validation, visualization, insight).
pub const MODEL_VAR: &str = "DATASIGHT_MODEL";
/// Cheaper model for the structured chart-title call.
pub const HELPER_MODEL_VAR: &str = "DATASIGHT_HELPER_MODEL";
/// Data-source selection: `sqlite:<path>` or `firestore:<project>`. Required.
pub const BACKEND_VAR: &str = "DATASIGHT_BACKEND";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_HELPER_MODEL: &str = "gemini-1.5-flash";

/// Which data-source adapter to construct, and its connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Embedded SQLite database file.
    Sqlite(PathBuf),
    /// Firestore project (default database).
    Firestore(String),
}

/// Everything the composition root needs to wire a run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Gemini API key.
    pub api_key: String,
    /// Primary model.
    pub model: ModelName,
    /// Helper model for cheap structured calls.
    pub helper_model: ModelName,
    /// Data-source selection.
    pub backend: Backend,
}

impl RuntimeConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let api_key =
            env::var(API_KEY_VAR).with_context(|| format!("{API_KEY_VAR} is not set"))?;
        if api_key.trim().is_empty() {
            bail!("{API_KEY_VAR} is set but empty");
        }
        let backend_value =
            env::var(BACKEND_VAR).with_context(|| format!("{BACKEND_VAR} is not set"))?;
        Ok(Self {
            api_key,
            model: model_from_env(MODEL_VAR, DEFAULT_MODEL)?,
            helper_model: model_from_env(HELPER_MODEL_VAR, DEFAULT_HELPER_MODEL)?,
            backend: parse_backend(&backend_value)?,
        })
    }
}

fn model_from_env(var: &str, default: &str) -> Result<ModelName> {
    let name = env::var(var).unwrap_or_else(|_| default.to_owned());
    ModelName::new(name).ok_or_else(|| anyhow!("{var} is set but empty"))
}

/// Parses a `<family>:<target>` backend selector.
pub fn parse_backend(value: &str) -> Result<Backend> {
    match value.split_once(':') {
        Some(("sqlite", path)) if !path.trim().is_empty() => {
            Ok(Backend::Sqlite(PathBuf::from(path)))
        }
        Some(("firestore", project)) if !project.trim().is_empty() => {
            Ok(Backend::Firestore(project.trim().to_owned()))
        }
        _ => bail!("{BACKEND_VAR} must be 'sqlite:<path>' or 'firestore:<project>', got '{value}'"),
    }
}
