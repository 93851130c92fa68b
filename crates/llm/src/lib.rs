//! DataSight LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::ports::LlmProvider`] trait for Google's Gemini
//! API. Additional providers are added as new types in this crate without
//! any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, and retry/back-off live here. The [`pipeline`] crate sees only
//! the `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pipeline::{
    CompletionRequest, LlmCompletion, LlmError, LlmProvider, ModelName, RetryPolicy, TokenCount,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_MAX_EXPONENT: u32 = 10;

/// Exponential back-off for the given attempt (1-based), doubling from
/// [`BACKOFF_BASE`] and capped so large `max_attempts` settings cannot
/// overflow the duration multiply.
fn backoff_for(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.pow(attempt.saturating_sub(1).min(BACKOFF_MAX_EXPONENT))
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for [`GeminiProvider`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// Model to call.
    pub model: ModelName,
    /// Service base URL. Overridable so tests and proxies can redirect the
    /// adapter.
    pub base_url: String,
    /// Per-call deadline.
    pub timeout: Duration,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
}

impl GeminiConfig {
    /// Creates a config with default endpoint, timeout, and retry settings.
    pub fn new(api_key: impl Into<String>, model: ModelName) -> Self {
        Self {
            api_key: api_key.into(),
            model,
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "usageMetadata")]
    usage: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: u64,
}

/// Extracts the completion from a decoded response body.
fn completion_from_response(
    response: GenerateContentResponse,
) -> Result<LlmCompletion, LlmError> {
    let text = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    let tokens = TokenCount::new(response.usage.map_or(0, |u| u.total_token_count));
    Ok(LlmCompletion { text, tokens })
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// [`LlmProvider`] over the Gemini `generateContent` endpoint.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a provider with its own HTTP client.
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LlmError::Transport {
                message: format!("could not build HTTP client: {err}"),
            })?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn call_once(&self, request: &CompletionRequest) -> Result<LlmCompletion, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmError::Timeout {
                        after: self.config.timeout,
                    }
                } else {
                    LlmError::Transport {
                        message: err.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let decoded: GenerateContentResponse =
            response.json().await.map_err(|err| LlmError::Transport {
                message: format!("could not decode response body: {err}"),
            })?;
        completion_from_response(decoded)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<LlmCompletion, LlmError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once(&request).await {
                Ok(completion) => {
                    debug!(
                        model = %self.config.model,
                        tokens = %completion.tokens,
                        "completion received"
                    );
                    return Ok(completion);
                }
                Err(err) => {
                    if attempt >= self.config.max_attempts {
                        return Err(err);
                    }
                    match err.retry_policy() {
                        RetryPolicy::NonRetryable => return Err(err),
                        RetryPolicy::Retryable { after } => {
                            let backoff = after.unwrap_or_else(|| backoff_for(attempt));
                            warn!(%err, attempt, ?backoff, "retrying LLM call");
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            }
        }
    }
}
