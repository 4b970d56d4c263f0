//! Core types for the research pipeline
//!
//! Defines the records threaded through a run:
//! - The accepted research question
//! - Intent classification
//! - Sub-questions and their identifiers
//! - Papers, evidence and per-sub-question synthesis results

use crate::error::PipelineError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A research question accepted by the pipeline
///
/// Construction trims the text and rejects blank input, so holding a
/// `ResearchQuestion` proves the text is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchQuestion {
    text: String,
}

impl ResearchQuestion {
    /// Accept a raw question
    ///
    /// # Errors
    /// `PipelineError::InvalidInput` if the text is empty after trimming
    pub fn new(raw: &str) -> Result<Self, PipelineError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(PipelineError::InvalidInput(
                "research question must not be empty".to_string(),
            ));
        }
        Ok(Self {
            text: text.to_string(),
        })
    }

    /// Question text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ResearchQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Closed set of research intents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentLabel {
    /// Contrast two or more approaches
    Comparison,
    /// Broad overview of a field
    Survey,
    /// Find how a specific method works
    MethodLookup,
    /// Explain a term or concept
    Definition,
    /// Anything that fits none of the above
    Other,
}

impl IntentLabel {
    /// Every label, in declaration order
    pub const ALL: [IntentLabel; 5] = [
        IntentLabel::Comparison,
        IntentLabel::Survey,
        IntentLabel::MethodLookup,
        IntentLabel::Definition,
        IntentLabel::Other,
    ];

    /// Wire name of the label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Comparison => "COMPARISON",
            IntentLabel::Survey => "SURVEY",
            IntentLabel::MethodLookup => "METHOD_LOOKUP",
            IntentLabel::Definition => "DEFINITION",
            IntentLabel::Other => "OTHER",
        }
    }

    /// Parse a label leniently (case-insensitive, spaces or hyphens for underscores)
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();

        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified intent with confidence in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent label
    pub label: IntentLabel,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

impl Intent {
    /// Create new intent, clamping confidence into [0, 1]
    #[inline]
    #[must_use]
    pub fn new(label: IntentLabel, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { label, confidence }
    }

    /// Degraded intent used when classification is unavailable
    #[inline]
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(IntentLabel::Other, 0.0)
    }
}

/// Sub-question identifier: its 1-based ordinal in decomposition order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubQuestionId(u32);

impl SubQuestionId {
    /// Create identifier from ordinal
    #[inline]
    #[must_use]
    pub fn new(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// 1-based ordinal
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubQuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// One focused question produced by decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    /// Ordinal identifier
    pub id: SubQuestionId,
    /// Question text
    pub text: String,
}

impl SubQuestion {
    /// Create new sub-question
    #[inline]
    #[must_use]
    pub fn new(ordinal: u32, text: impl Into<String>) -> Self {
        Self {
            id: SubQuestionId::new(ordinal),
            text: text.into(),
        }
    }
}

/// Paper record as returned by a paper source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Source identifier (arXiv id for arXiv papers)
    pub id: String,
    /// Paper title
    pub title: String,
    /// Author names in listed order
    pub authors: Vec<String>,
    /// Publication date as reported by the source
    pub published: String,
    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Direct PDF link, if the source has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Create paper with the fields every source provides
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            published: String::new(),
            abstract_text: abstract_text.into(),
            pdf_url: None,
        }
    }

    /// With authors
    #[inline]
    #[must_use]
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    /// With publication date
    #[inline]
    #[must_use]
    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = published.into();
        self
    }

    /// With PDF link
    #[inline]
    #[must_use]
    pub fn with_pdf_url(mut self, url: impl Into<String>) -> Self {
        self.pdf_url = Some(url.into());
        self
    }

    /// Landing page for the paper on arXiv
    #[inline]
    #[must_use]
    pub fn abs_url(&self) -> String {
        format!("https://arxiv.org/abs/{}", self.id)
    }
}

/// A paper (or excerpt of one) used to support a synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Identifier of the paper in its source
    pub source_id: String,
    /// Paper title
    pub title: String,
    /// Abstract excerpt shown to the reasoner
    pub excerpt: String,
    /// Link to the paper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl EvidenceItem {
    /// Build evidence from a paper, truncating the abstract to `excerpt_chars`
    #[must_use]
    pub fn from_paper(paper: &Paper, excerpt_chars: usize) -> Self {
        Self {
            source_id: paper.id.clone(),
            title: paper.title.clone(),
            excerpt: crate::evidence::truncate_chars(&paper.abstract_text, excerpt_chars),
            url: Some(paper.abs_url()),
        }
    }
}

/// Outcome class of one synthesis
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynthesisStatus {
    /// Grounded answer produced
    Ok,
    /// Answer produced without full evidence
    Partial,
    /// No answer could be produced
    Failed,
}

impl SynthesisStatus {
    /// Check if status is degraded (anything but OK)
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !matches!(self, SynthesisStatus::Ok)
    }
}

impl fmt::Display for SynthesisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SynthesisStatus::Ok => "OK",
            SynthesisStatus::Partial => "PARTIAL",
            SynthesisStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Answer to one sub-question (write-once)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Sub-question this result answers
    pub sub_question: SubQuestionId,
    /// Synthesized text (empty when FAILED)
    pub text: String,
    /// Evidence the text is grounded in
    pub evidence: Vec<EvidenceItem>,
    /// Outcome class
    pub status: SynthesisStatus,
    /// Error detail when status is not OK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SynthesisResult {
    /// Fully grounded result
    #[must_use]
    pub fn ok(sub_question: SubQuestionId, text: String, evidence: Vec<EvidenceItem>) -> Self {
        Self {
            sub_question,
            text,
            evidence,
            status: SynthesisStatus::Ok,
            error: None,
        }
    }

    /// Best-effort result with a note on what was missing
    #[must_use]
    pub fn partial(
        sub_question: SubQuestionId,
        text: String,
        evidence: Vec<EvidenceItem>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            sub_question,
            text,
            evidence,
            status: SynthesisStatus::Partial,
            error: Some(detail.into()),
        }
    }

    /// Failed result; text is always empty
    #[must_use]
    pub fn failed(sub_question: SubQuestionId, detail: impl Into<String>) -> Self {
        Self {
            sub_question,
            text: String::new(),
            evidence: Vec::new(),
            status: SynthesisStatus::Failed,
            error: Some(detail.into()),
        }
    }
}

/// Fan-in accounting for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Wall-clock time of the run in milliseconds
    pub elapsed_ms: u64,
    /// Syntheses with status OK
    pub ok: usize,
    /// Syntheses with status PARTIAL
    pub partial: usize,
    /// Syntheses with status FAILED (including timed out)
    pub failed: usize,
    /// Syntheses cut off by the pipeline timeout
    pub timed_out: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_generation() {
        let id1 = RunId::new();
        let id2 = RunId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn research_question_trims() {
        let q = ResearchQuestion::new("  what is attention?  ").unwrap();
        assert_eq!(q.as_str(), "what is attention?");
    }

    #[test]
    fn research_question_rejects_blank() {
        assert!(matches!(
            ResearchQuestion::new(""),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(matches!(
            ResearchQuestion::new(" \n\t "),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn intent_label_parse_is_lenient() {
        assert_eq!(IntentLabel::parse("comparison"), Some(IntentLabel::Comparison));
        assert_eq!(IntentLabel::parse("Method Lookup"), Some(IntentLabel::MethodLookup));
        assert_eq!(IntentLabel::parse("method-lookup"), Some(IntentLabel::MethodLookup));
        assert_eq!(IntentLabel::parse("\"SURVEY\""), Some(IntentLabel::Survey));
        assert_eq!(IntentLabel::parse("brainstorm"), None);
    }

    #[test]
    fn intent_label_serializes_screaming_snake() {
        let json = serde_json::to_string(&IntentLabel::MethodLookup).unwrap();
        assert_eq!(json, "\"METHOD_LOOKUP\"");
    }

    #[test]
    fn intent_confidence_is_clamped() {
        assert_eq!(Intent::new(IntentLabel::Survey, 1.7).confidence, 1.0);
        assert_eq!(Intent::new(IntentLabel::Survey, -0.2).confidence, 0.0);
        assert_eq!(Intent::new(IntentLabel::Survey, f64::NAN).confidence, 0.0);
        assert_eq!(Intent::fallback().label, IntentLabel::Other);
    }

    #[test]
    fn failed_result_has_empty_text() {
        let result = SynthesisResult::failed(SubQuestionId::new(1), "reasoner down");
        assert!(result.text.is_empty());
        assert!(result.evidence.is_empty());
        assert_eq!(result.status, SynthesisStatus::Failed);
        assert!(result.status.is_degraded());
    }

    #[test]
    fn paper_serializes_abstract_field() {
        let paper = Paper::new("2101.00001", "Title", "An abstract.");
        let value = serde_json::to_value(&paper).unwrap();
        assert_eq!(value["abstract"], "An abstract.");
        assert!(value.get("pdf_url").is_none());
        assert_eq!(paper.abs_url(), "https://arxiv.org/abs/2101.00001");
    }

    #[test]
    fn evidence_from_paper_truncates_excerpt() {
        let paper = Paper::new("p1", "Title", "abcdefghij");
        let evidence = EvidenceItem::from_paper(&paper, 4);
        assert_eq!(evidence.excerpt, "abcd…");
        assert_eq!(evidence.source_id, "p1");
    }
}
