//! Error and retry-policy types for the DataSight pipeline domain.
//!
//! Collaborator errors ([`LlmError`], [`DataSourceError`]) describe expected
//! failures of the external services a run depends on; they are recorded into
//! the run state's `failure` slot and degrade the run rather than aborting it.
//! [`StageFault`] is different in kind: it marks a programming or contract
//! fault inside a stage, which is run-fatal and stops dispatch.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let adapters decide whether to
/// re-invoke an operation before surfacing the failure to the pipeline.
///
/// - `Retryable` errors: API timeouts, transient rate-limit responses,
///   server-side (5xx) failures.
/// - `NonRetryable` errors: authentication failures, malformed requests,
///   unparseable responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the failure is surfaced as-is.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// LLM collaborator errors
// ---------------------------------------------------------------------------

/// Failure of a text-completion call to the LLM collaborator.
///
/// Model output that arrives but cannot be parsed into the structure a stage
/// asked for is *not* an [`LlmError`]; that is malformed-output handling,
/// dealt with locally by the requesting stage (see
/// [`crate::sanitize::SanitizeError`]).
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider could not be reached or the connection broke mid-call.
    #[error("LLM transport failure: {message}")]
    Transport {
        /// Human-readable description of the transport problem.
        message: String,
    },

    /// The call did not complete within the configured deadline.
    #[error("LLM call timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The provider rejected the call with a rate-limit response.
    #[error("LLM rate limited")]
    RateLimited {
        /// Server-suggested back-off, when the response carried one.
        retry_after: Option<Duration>,
    },

    /// The provider returned a non-success HTTP status.
    #[error("LLM call failed with status {status}: {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The response decoded but carried no completion text.
    #[error("LLM response contained no completion text")]
    EmptyCompletion,
}

impl LlmError {
    /// Retry classification for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            LlmError::Timeout { .. } | LlmError::Transport { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            LlmError::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            LlmError::Api { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            LlmError::Api { .. } | LlmError::EmptyCompletion => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Data-source collaborator errors
// ---------------------------------------------------------------------------

/// Failure of a query execution against the data-source collaborator.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// The engine could not be reached (network, file, credentials).
    #[error("data source unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the problem.
        message: String,
    },

    /// The engine accepted the connection but rejected the query.
    #[error("query rejected: {message}")]
    QueryRejected {
        /// The engine's error text.
        message: String,
    },

    /// The query descriptor cannot be executed by this adapter (e.g. a
    /// planned document query handed to a relational adapter).
    #[error("unsupported query descriptor: {message}")]
    UnsupportedQuery {
        /// Description of the mismatch.
        message: String,
    },

    /// The engine's response could not be decoded into a [`crate::Table`].
    #[error("could not decode result set: {message}")]
    Decode {
        /// Description of the decoding problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Stage faults
// ---------------------------------------------------------------------------

/// A programming or contract fault inside a stage.
///
/// Run-fatal: the runner surfaces a distinguished failure event and stops
/// dispatching further stages. A stage's documented, expected inability to
/// act (no data, prior soft failure) must never be expressed this way — it
/// is a normal partial update with the stage's no-op output.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StageFault {
    /// Description of the violated contract.
    pub message: String,
}

impl StageFault {
    /// Creates a [`StageFault`] with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
