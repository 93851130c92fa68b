//! Sanitising untrusted model output.
//!
//! The LLM collaborator is a free-text generator, not a structured API. Even
//! when a prompt demands "only a JSON object" or "only SQL", replies arrive
//! wrapped in markdown fences, prefixed with chatty preamble, or both. Every
//! call site that wants structure out of a completion goes through this
//! module instead of doing inline string surgery, so the cleanup rules are
//! explicit and testable.
//!
//! Rules:
//! - [`strip_code_fences`] removes a single leading fence (with optional
//!   language tag) and a single trailing fence, then trims whitespace.
//! - [`parse_json_object`] fence-strips, then parses; if the whole text is
//!   not valid JSON it retries on the span from the first `{` to the last
//!   `}`, which tolerates preamble and trailing commentary.
//! - [`extract_sql`] fence-strips, then locates the first occurrence of a
//!   query keyword (`SELECT` or `WITH`, case-insensitive, on a word
//!   boundary) and discards everything before it. No keyword means the text
//!   is not a query and the caller must treat the plan as invalid.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to recover structure from model output.
///
/// Carries a short snippet of the offending text for logs; never the full
/// completion, which can be arbitrarily large.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// No JSON object delimiters were found in the text.
    #[error("no JSON object found in model output: {snippet:?}")]
    NoJsonObject {
        /// Leading fragment of the offending text.
        snippet: String,
    },

    /// A candidate JSON span was found but did not parse or did not match
    /// the expected structure.
    #[error("model output is not valid JSON ({message}): {snippet:?}")]
    InvalidJson {
        /// The parser's error text.
        message: String,
        /// Leading fragment of the offending text.
        snippet: String,
    },

    /// No `SELECT` or `WITH` keyword was found, so the text cannot be a
    /// query.
    #[error("no query keyword (SELECT or WITH) found in model output: {snippet:?}")]
    MissingQueryKeyword {
        /// Leading fragment of the offending text.
        snippet: String,
    },
}

const SNIPPET_LEN: usize = 120;

fn snippet(text: &str) -> String {
    let mut end = text.len().min(SNIPPET_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_owned()
}

/// Removes a single wrapping markdown code fence, if present, and trims
/// surrounding whitespace.
///
/// A leading fence may carry a language tag (```` ```json ````); the tag and
/// the rest of the fence line are discarded. Text without fences is returned
/// trimmed and otherwise untouched.
pub fn strip_code_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```") {
        // Drop the language tag up to the end of the fence line.
        t = match rest.split_once('\n') {
            Some((_tag, body)) => body,
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = t.trim_end().strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Extracts and parses a JSON object of type `T` from model output.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, SanitizeError> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let start = cleaned.find('{');
            let end = cleaned.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str(&cleaned[s..=e])
                    .map_err(|err| SanitizeError::InvalidJson {
                        message: err.to_string(),
                        snippet: snippet(cleaned),
                    }),
                _ => {
                    if cleaned.contains('{') || cleaned.contains('}') {
                        Err(SanitizeError::InvalidJson {
                            message: first_err.to_string(),
                            snippet: snippet(cleaned),
                        })
                    } else {
                        Err(SanitizeError::NoJsonObject {
                            snippet: snippet(cleaned),
                        })
                    }
                }
            }
        }
    }
}

/// Extracts SQL text from model output by locating the first query keyword
/// and discarding everything before it.
pub fn extract_sql(text: &str) -> Result<String, SanitizeError> {
    let cleaned = strip_code_fences(text);
    match find_query_keyword(cleaned) {
        Some(at) => Ok(cleaned[at..].trim().to_owned()),
        None => Err(SanitizeError::MissingQueryKeyword {
            snippet: snippet(cleaned),
        }),
    }
}

/// Byte offset of the earliest `SELECT` or `WITH` on a word boundary,
/// case-insensitive.
///
/// Folds case per ASCII byte so offsets into the folded text stay valid in
/// the original; the keywords are ASCII, and non-ASCII preamble (which a
/// full Unicode uppercase could resize) passes through untouched.
fn find_query_keyword(text: &str) -> Option<usize> {
    let upper = text.to_ascii_uppercase();
    ["SELECT", "WITH"]
        .iter()
        .filter_map(|kw| find_word(&upper, kw))
        .min()
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(word) {
        let at = from + rel;
        let before_ok = at == 0
            || !haystack[..at]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        let after = at + word.len();
        let after_ok = after == haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + word.len();
    }
    None
}
