//! Error types for the research pipeline
//!
//! Three families, matching how far each error may travel:
//! - `PipelineError`: the only errors that cross the orchestrator boundary
//!   (blank input and contract violations)
//! - `CapabilityError`: reasoner / paper-source failures, absorbed by the
//!   owning stage after bounded retry
//! - `ConfigError`: configuration loading and validation

use crate::types::SubQuestionId;
use std::path::PathBuf;

/// Errors surfaced by a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Blank or otherwise unusable research question
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Composer invoked with a synthesis set that does not match the sub-questions
    #[error("incomplete input: missing results for {missing:?}, unexpected results for {unexpected:?}")]
    IncompleteInput {
        /// Sub-questions with no synthesis result
        missing: Vec<SubQuestionId>,
        /// Results keyed by sub-questions that were never generated
        unexpected: Vec<SubQuestionId>,
    },

    /// Report or state machine failed an internal invariant check
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}

impl PipelineError {
    /// Check if error is a programming-contract violation (a defect)
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::IncompleteInput { .. } | Self::InternalConsistency(_)
        )
    }
}

/// Failures of an external capability call (reasoner or paper source)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Call did not finish within its time budget
    #[error("call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Provider asked us to slow down
    #[error("rate limited by provider")]
    RateLimited {
        /// Server-provided retry hint
        retry_after_secs: Option<u64>,
    },

    /// Transport-level failure
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Response arrived but could not be interpreted
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Failure that retrying cannot fix (auth, bad request)
    #[error("capability unavailable: {message}")]
    Permanent { message: String },
}

impl CapabilityError {
    /// Check if error is transient and worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent { .. })
    }

    /// Shorthand for a malformed-response error
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Shorthand for a connection error
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Shorthand for a permanent error
    #[inline]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its allowed range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
