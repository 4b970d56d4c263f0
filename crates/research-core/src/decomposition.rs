//! Sub-question decomposition
//!
//! Breaks a research question into an ordered, deduplicated list of focused
//! sub-questions. The order is a contract: report sections follow it.
//! Total generation failure falls back to the original question.

use crate::capability::Reasoner;
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::CapabilityError;
use crate::prompts;
use crate::retry::call_with_retry;
use crate::types::{Intent, ResearchQuestion, SubQuestion};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Leading list marker: `-`, `*`, `•`, `1.`, `1)`, `(1)`, `Q1:`
static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\(?\d+[.):]|[Qq]\d+[.):])\s*").expect("static regex")
});

/// Decomposes a question into sub-questions
pub struct SubQuestionGenerator {
    reasoner: Arc<dyn Reasoner>,
    retry: RetryConfig,
    call_timeout: Duration,
    max_sub_questions: usize,
}

impl SubQuestionGenerator {
    /// Create new generator
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>, config: &PipelineConfig) -> Self {
        Self {
            reasoner,
            retry: config.retry.clone(),
            call_timeout: config.call_timeout(),
            max_sub_questions: config.max_sub_questions.max(1),
        }
    }

    /// Configured upper bound
    #[inline]
    #[must_use]
    pub fn max_sub_questions(&self) -> usize {
        self.max_sub_questions
    }

    /// Decompose the question
    ///
    /// # Returns
    /// Between 1 and `max_sub_questions` sub-questions with ordinals 1..=N.
    /// If generation fails entirely, exactly one sub-question equal to the
    /// original question.
    pub async fn decompose(
        &self,
        question: &ResearchQuestion,
        intent: &Intent,
    ) -> Vec<SubQuestion> {
        let prompt = prompts::decompose(question, intent, self.max_sub_questions);
        let max = self.max_sub_questions;

        let outcome = call_with_retry(&self.retry, self.call_timeout, "decompose", || async {
            let text = self.reasoner.infer(&prompt).await?;
            parse_sub_questions(&text, max)
        })
        .await;

        let texts = match outcome {
            Ok(texts) => texts,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Decomposition unavailable, using the original question"
                );
                vec![question.as_str().to_string()]
            }
        };

        number(texts)
    }
}

/// Assign ordinals 1..=N in order
fn number(texts: Vec<String>) -> Vec<SubQuestion> {
    texts
        .into_iter()
        .zip(1u32..)
        .map(|(text, ordinal)| SubQuestion::new(ordinal, text))
        .collect()
}

/// Parse a decomposition reply into at most `max` distinct sub-questions
///
/// Accepts a JSON array of strings or numbered / bulleted lines. When any
/// line carries a list marker, unmarked lines (preambles) are dropped.
///
/// # Errors
/// `CapabilityError::MalformedResponse` if no sub-question can be read
pub fn parse_sub_questions(text: &str, max: usize) -> Result<Vec<String>, CapabilityError> {
    let body = prompts::strip_code_fence(text);

    let candidates = match prompts::delimited(body, '[', ']')
        .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok())
    {
        Some(items) => items,
        None => parse_list_lines(body),
    };

    let distinct = dedupe(candidates, max);
    if distinct.is_empty() {
        return Err(CapabilityError::malformed("no sub-questions in response"));
    }
    Ok(distinct)
}

fn parse_list_lines(body: &str) -> Vec<String> {
    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    let any_marked = lines.iter().any(|l| LIST_MARKER.is_match(l));

    lines
        .into_iter()
        .filter(|l| !any_marked || LIST_MARKER.is_match(l))
        .map(|l| LIST_MARKER.replace(l, "").trim().to_string())
        .collect()
}

/// Drop blanks, punctuation-only lines and near-duplicates, keep first
/// occurrence order, truncate to `max`
#[must_use]
pub fn dedupe(candidates: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|c| {
            let key = normalize_question(c);
            !key.is_empty() && seen.insert(key)
        })
        .take(max)
        .collect()
}

/// Comparison key: lowercase, single spaces, no trailing `?` / `.` / `!`
#[must_use]
pub fn normalize_question(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(['?', '.', '!'])
        .trim_end()
        .to_string()
}
