//! Pipeline configuration
//!
//! All bounds that shape a run live here: decomposition size, evidence
//! budget, fan-out width, timeouts and the retry policy applied to every
//! capability call. Loadable from TOML with environment overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on generated sub-questions
    pub max_sub_questions: usize,
    /// Evidence items kept per sub-question
    pub evidence_top_k: usize,
    /// Results requested from the paper source per sub-question
    pub search_results_per_query: usize,
    /// Abstract characters kept per evidence excerpt
    pub excerpt_chars: usize,
    /// Minimum word-overlap similarity for pooled papers to count as evidence
    pub pool_min_similarity: f64,
    /// Maximum synthesis tasks in flight at once
    pub max_concurrent_syntheses: usize,
    /// Overall run budget; unfinished syntheses are marked FAILED when exceeded
    pub pipeline_timeout_secs: Option<u64>,
    /// Time budget of a single capability call
    pub call_timeout_secs: u64,
    /// Retry policy for capability calls
    pub retry: RetryConfig,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max sub-questions
    #[inline]
    #[must_use]
    pub fn with_max_sub_questions(mut self, max: usize) -> Self {
        self.max_sub_questions = max;
        self
    }

    /// With evidence top-k
    #[inline]
    #[must_use]
    pub fn with_evidence_top_k(mut self, top_k: usize) -> Self {
        self.evidence_top_k = top_k;
        self
    }

    /// With max concurrent syntheses
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrent_syntheses = max;
        self
    }

    /// With overall pipeline timeout (`None` disables it)
    #[inline]
    #[must_use]
    pub fn with_pipeline_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pipeline_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    /// With per-call timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Overall pipeline timeout as a duration
    #[inline]
    #[must_use]
    pub fn pipeline_timeout(&self) -> Option<Duration> {
        self.pipeline_timeout_secs.map(Duration::from_secs)
    }

    /// Per-call timeout as a duration
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid`
    /// if the parsed values fail validation
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Read` if the file cannot be read, otherwise as
    /// [`PipelineConfig::from_toml_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `RESEARCH_*` environment overrides
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if a variable is set but not a number
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production)
    pub(crate) fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "RESEARCH_MAX_SUB_QUESTIONS")? {
            self.max_sub_questions = v as usize;
        }
        if let Some(v) = parse_var(&lookup, "RESEARCH_MAX_CONCURRENCY")? {
            self.max_concurrent_syntheses = v as usize;
        }
        if let Some(v) = parse_var(&lookup, "RESEARCH_TOP_K")? {
            self.evidence_top_k = v as usize;
        }
        if let Some(v) = parse_var(&lookup, "RESEARCH_PIPELINE_TIMEOUT_SECS")? {
            // 0 disables the overall timeout
            self.pipeline_timeout_secs = (v > 0).then_some(v);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check every bound is usable
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sub_questions == 0 {
            return Err(ConfigError::Invalid("max_sub_questions must be at least 1".into()));
        }
        if self.evidence_top_k == 0 {
            return Err(ConfigError::Invalid("evidence_top_k must be at least 1".into()));
        }
        if self.search_results_per_query == 0 {
            return Err(ConfigError::Invalid(
                "search_results_per_query must be at least 1".into(),
            ));
        }
        if self.excerpt_chars == 0 {
            return Err(ConfigError::Invalid("excerpt_chars must be at least 1".into()));
        }
        if self.max_concurrent_syntheses == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_syntheses must be at least 1".into(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid("call_timeout_secs must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.pool_min_similarity) {
            return Err(ConfigError::Invalid(
                "pool_min_similarity must be within [0, 1]".into(),
            ));
        }
        self.retry.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sub_questions: 8,
            evidence_top_k: 5,
            search_results_per_query: 5,
            excerpt_chars: 1200,
            pool_min_similarity: 0.05,
            max_concurrent_syntheses: 4,
            pipeline_timeout_secs: Some(300),
            call_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| {
                ConfigError::Invalid(format!("{key} must be a non-negative integer, got {raw:?}"))
            }),
    }
}

/// Bounded exponential backoff policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff_ms: u64,
    /// Ceiling on any single delay
    pub max_backoff_ms: u64,
    /// Growth factor between attempts
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl RetryConfig {
    /// Retry without delays (tests and offline runs)
    #[inline]
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must not be below initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}
