//! External capabilities consumed by the pipeline
//!
//! The pipeline never talks to a model or a search index directly. It goes
//! through two narrow async traits:
//! - [`Reasoner`]: `infer(prompt) -> text`
//! - [`PaperSource`]: `search(query, max_results) -> papers`
//!
//! Implementations live in `research-providers` (HTTP) and
//! `research-test-utils` (scripted fakes).

use crate::error::CapabilityError;
use crate::types::Paper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Pipeline stage a prompt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKind {
    /// Intent classification
    ClassifyIntent,
    /// Sub-question generation
    Decompose,
    /// Per-sub-question synthesis
    Synthesize,
    /// Overall report summary
    Summarize,
}

/// Prompt sent to a reasoner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Stage that issued the prompt
    pub kind: PromptKind,
    /// Instructions (system message)
    pub system: String,
    /// Task content (user message)
    pub user: String,
}

impl Prompt {
    /// Create new prompt
    #[inline]
    #[must_use]
    pub fn new(kind: PromptKind, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Text-in, text-out reasoning capability (an LLM in production)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Run one inference
    ///
    /// # Errors
    /// Transient failures (timeout, rate limit, connection, malformed
    /// response) are retried by callers; `Permanent` is not.
    async fn infer(&self, prompt: &Prompt) -> Result<String, CapabilityError>;
}

/// Ranked paper search capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Search for papers relevant to `query`, best match first
    ///
    /// An empty result is valid and not an error.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<Paper>, CapabilityError>;
}
