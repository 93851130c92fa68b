//! Port traits for the external collaborators.
//!
//! The pipeline depends on two opaque services: an LLM text-completion
//! provider and a tabular data source. This crate defines *what* it needs
//! from them; infrastructure crates (`llm`, `datasource`) define *how* each
//! is supplied. Stages hold the traits only, which is also what makes the
//! orchestration testable with in-process fakes.

use async_trait::async_trait;

use crate::{DataSourceError, LlmError, QueryDescriptor, Table, TokenCount};

// ---------------------------------------------------------------------------
// LLM collaborator
// ---------------------------------------------------------------------------

/// One text-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The full prompt text.
    pub prompt: String,
    /// Sampling temperature. Structured calls (query plans, validation,
    /// chart titles) use `0.0`; the prose insight call runs warmer.
    pub temperature: f32,
}

impl CompletionRequest {
    /// A deterministic (temperature zero) request, used by every stage that
    /// parses the reply into structure.
    pub fn deterministic(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.0,
        }
    }

    /// A request with an explicit sampling temperature.
    pub fn with_temperature(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
        }
    }
}

/// A completed LLM call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletion {
    /// The completion text. Untrusted free text: callers must sanitise
    /// before structured parsing (see [`crate::sanitize`]).
    pub text: String,
    /// Total tokens the provider reported for the call, when available.
    pub tokens: TokenCount,
}

/// The LLM text-completion collaborator.
///
/// Implementations may be slow and may fail with transport errors; they must
/// not retry indefinitely — surfacing an [`LlmError`] lets the calling stage
/// degrade the run instead.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends one prompt and returns the completion.
    async fn complete(&self, request: CompletionRequest) -> Result<LlmCompletion, LlmError>;
}

// ---------------------------------------------------------------------------
// Data-source collaborator
// ---------------------------------------------------------------------------

/// The tabular data-source collaborator.
///
/// Accepts an opaque [`QueryDescriptor`] and returns an ordered result
/// table or a declared error. An empty result is a successful empty
/// [`Table`], never an error.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Executes the query and decodes the result set.
    async fn run(&self, query: &QueryDescriptor) -> Result<Table, DataSourceError>;
}
