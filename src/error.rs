//! Error types for the studio and its provider calls.

use std::time::Duration;

/// Provider text that signals the selected key no longer maps to a project.
pub const INVALID_ENTITY_MARKER: &str = "Requested entity was not found.";

/// Longest provider message carried into an error.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while talking to the generative provider.
#[derive(Debug, thiserror::Error)]
pub enum ReimagineError {
    /// No API key could be resolved.
    #[error("API Key missing.")]
    MissingCredential,

    /// API key rejected by the provider.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters, or an unknown model.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No candidate part carried inline image data.
    #[error("No image data returned from the model.")]
    NoImageData,

    /// Response parsed but did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data or a data URL.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., reading an upload or saving output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReimagineError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Network(e) => !e.is_builder() && !e.is_decode() && !e.is_status(),
            _ => false,
        }
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    /// Returns true when the provider reported that the key's entity is gone,
    /// which is the cue to ask the user to select a key again.
    pub fn is_invalid_entity(&self) -> bool {
        self.to_string().contains(INVALID_ENTITY_MARKER)
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, ReimagineError>;

/// Extracts a readable message from a provider error body.
///
/// Google APIs wrap errors as `{"error": {"message": ...}}`; anything else is
/// passed through. The result is trimmed and capped in length.
pub(crate) fn sanitize_error_message(body: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    let trimmed = extracted.trim();
    if trimmed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    cut.push_str("...");
    cut
}

/// Reads a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
