//! Provider error types

use reqwest::header::{HeaderMap, RETRY_AFTER};
use research_core::CapabilityError;

/// Failures of an HTTP-backed provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    /// API key variable is unset or empty
    #[error("API key not found: environment variable {0} is not set")]
    MissingApiKey(String),

    /// Request exceeded the client timeout
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Network-level failure
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after_secs: Option<u64>,
    },

    /// Body could not be interpreted
    #[error("unparseable response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Classify a reqwest failure
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else {
            Self::Transport(err)
        }
    }
}

impl From<ProviderError> for CapabilityError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout { timeout_secs } => CapabilityError::Timeout { timeout_secs },
            ProviderError::Transport(e) => CapabilityError::connection(e.to_string()),
            ProviderError::Status {
                status: 429 | 503,
                retry_after_secs,
                ..
            } => CapabilityError::RateLimited { retry_after_secs },
            ProviderError::Status { status, body, .. } if status >= 500 => {
                CapabilityError::connection(format!("server error {status}: {body}"))
            }
            // 401/403 and other client errors will not improve on retry
            ProviderError::Status { status, body, .. } => {
                CapabilityError::permanent(format!("HTTP {status}: {body}"))
            }
            ProviderError::Parse(message) => CapabilityError::malformed(message),
            e @ (ProviderError::Client(_) | ProviderError::MissingApiKey(_)) => {
                CapabilityError::permanent(e.to_string())
            }
        }
    }
}

/// `Retry-After` in seconds, when given as an integer
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Keep error bodies short in logs and messages
pub(crate) fn snippet(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
