//! Report composition and validation
//!
//! Aggregates intent, ordered sub-questions and their synthesis results into
//! one [`ResearchReport`]. The report is checked against a JSON schema
//! derived from the Rust type, then against structural invariants the schema
//! cannot express. Any violation is a defect and surfaces as
//! [`PipelineError::InternalConsistency`].

use crate::capability::Reasoner;
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::{CapabilityError, PipelineError};
use crate::prompts;
use crate::retry::call_with_retry;
use crate::types::{
    Intent, IntentLabel, ResearchQuestion, SubQuestion, SubQuestionId, SynthesisResult,
    SynthesisStatus,
};
use indexmap::IndexMap;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Compiled report schema, built once per process
static REPORT_SCHEMA: Lazy<Result<JSONSchema, String>> = Lazy::new(|| {
    let schema = serde_json::to_value(schemars::schema_for!(ResearchReport))
        .map_err(|e| format!("report schema serialization: {e}"))?;
    JSONSchema::compile(&schema).map_err(|e| format!("report schema compilation: {e}"))
});

/// Final structured output of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchReport {
    /// `Research report: <question>`
    #[schemars(length(min = 1))]
    pub title: String,
    /// Original question
    #[schemars(length(min = 1))]
    pub question: String,
    /// Classified intent label
    pub intent: IntentLabel,
    /// One section per sub-question, in decomposition order
    #[schemars(length(min = 1))]
    pub sections: Vec<ReportSection>,
    /// Overall summary; absent when unavailable
    pub summary: Option<String>,
    /// Cited papers, deduplicated in order of first appearance
    pub citations: Vec<Citation>,
}

/// Report section bound to one sub-question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSection {
    /// Sub-question ordinal (1-based)
    #[schemars(range(min = 1))]
    pub ordinal: u32,
    /// Sub-question text
    #[schemars(length(min = 1))]
    pub sub_question: String,
    /// Synthesis outcome
    pub status: SynthesisStatus,
    /// Synthesized text (empty when FAILED)
    pub body: String,
    /// Ids of the papers this section draws on
    pub evidence_ids: Vec<String>,
    /// Degradation detail when status is not OK
    pub note: Option<String>,
}

/// Cited paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Citation {
    /// Paper identifier
    #[schemars(length(min = 1))]
    pub id: String,
    /// Paper title
    pub title: String,
    /// Link to the paper
    pub url: Option<String>,
}

impl ResearchReport {
    /// Report as a plain JSON value
    ///
    /// # Errors
    /// `PipelineError::InternalConsistency` if serialization fails
    pub fn to_value(&self) -> Result<serde_json::Value, PipelineError> {
        serde_json::to_value(self)
            .map_err(|e| PipelineError::InternalConsistency(format!("report serialization: {e}")))
    }

    /// Check if any section is degraded
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.sections.iter().any(|s| s.status.is_degraded())
    }

    /// Validate the report against its JSON schema and structural invariants
    ///
    /// # Errors
    /// `PipelineError::InternalConsistency` describing the first violation
    pub fn validate(&self, sub_questions: &[SubQuestion]) -> Result<(), PipelineError> {
        let value = self.to_value()?;
        let schema = REPORT_SCHEMA
            .as_ref()
            .map_err(|e| PipelineError::InternalConsistency(e.clone()))?;

        if let Err(errors) = schema.validate(&value) {
            let messages: Vec<String> = errors
                .map(|e| format!("{}: {e}", e.instance_path))
                .collect();
            return Err(PipelineError::InternalConsistency(format!(
                "report schema violation: {}",
                messages.join("; ")
            )));
        }

        self.check_structure(sub_questions)
    }

    fn check_structure(&self, sub_questions: &[SubQuestion]) -> Result<(), PipelineError> {
        let violation = |msg: String| Err(PipelineError::InternalConsistency(msg));

        if self.sections.len() != sub_questions.len() {
            return violation(format!(
                "{} sections for {} sub-questions",
                self.sections.len(),
                sub_questions.len()
            ));
        }

        let cited: HashSet<&str> = self.citations.iter().map(|c| c.id.as_str()).collect();

        for ((section, sub_question), expected) in
            self.sections.iter().zip(sub_questions).zip(1u32..)
        {
            if section.ordinal != expected || sub_question.id.ordinal() != expected {
                return violation(format!(
                    "section ordinal {} out of sequence (expected {expected})",
                    section.ordinal
                ));
            }
            if section.sub_question != sub_question.text {
                return violation(format!("section {expected} does not match its sub-question"));
            }
            if section.status == SynthesisStatus::Failed && !section.body.is_empty() {
                return violation(format!("failed section {expected} has a body"));
            }
            if let Some(id) = section.evidence_ids.iter().find(|id| !cited.contains(id.as_str())) {
                return violation(format!("section {expected} cites {id} missing from citations"));
            }
        }

        Ok(())
    }
}

/// Builds and validates the final report
pub struct ReportComposer {
    reasoner: Arc<dyn Reasoner>,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl ReportComposer {
    /// Create new composer
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>, config: &PipelineConfig) -> Self {
        Self {
            reasoner,
            retry: config.retry.clone(),
            call_timeout: config.call_timeout(),
        }
    }

    /// Compose the report
    ///
    /// # Errors
    /// - `IncompleteInput` if `results` does not hold exactly one entry per
    ///   sub-question
    /// - `InternalConsistency` if the composed report fails validation
    pub async fn compose(
        &self,
        question: &ResearchQuestion,
        intent: &Intent,
        sub_questions: &[SubQuestion],
        results: &IndexMap<SubQuestionId, SynthesisResult>,
    ) -> Result<ResearchReport, PipelineError> {
        check_coverage(sub_questions, results)?;

        let mut sections = Vec::with_capacity(sub_questions.len());
        let mut citations: IndexMap<String, Citation> = IndexMap::new();

        for sub_question in sub_questions {
            // Coverage was checked above
            let Some(result) = results.get(&sub_question.id) else {
                continue;
            };

            for item in &result.evidence {
                citations.entry(item.source_id.clone()).or_insert_with(|| Citation {
                    id: item.source_id.clone(),
                    title: item.title.clone(),
                    url: item.url.clone(),
                });
            }

            sections.push(ReportSection {
                ordinal: sub_question.id.ordinal(),
                sub_question: sub_question.text.clone(),
                status: result.status,
                body: result.text.clone(),
                evidence_ids: result.evidence.iter().map(|e| e.source_id.clone()).collect(),
                note: result.error.clone(),
            });
        }

        let summary = self.summarize(question, &sections).await;

        let report = ResearchReport {
            title: format!("Research report: {question}"),
            question: question.as_str().to_string(),
            intent: intent.label,
            sections,
            summary,
            citations: citations.into_values().collect(),
        };

        if let Err(e) = report.validate(sub_questions) {
            tracing::error!(error = %e, "Composed report failed validation");
            return Err(e);
        }

        Ok(report)
    }

    /// Overall summary, or `None` when nothing was answered or the reasoner gave up
    async fn summarize(
        &self,
        question: &ResearchQuestion,
        sections: &[ReportSection],
    ) -> Option<String> {
        let answered: Vec<(String, String)> = sections
            .iter()
            .filter(|s| s.status != SynthesisStatus::Failed)
            .map(|s| (s.sub_question.clone(), s.body.clone()))
            .collect();

        if answered.is_empty() {
            tracing::info!("Every section failed, omitting summary");
            return None;
        }

        let prompt = prompts::summarize(question, &answered);
        let outcome = call_with_retry(&self.retry, self.call_timeout, "summarize", || async {
            let text = self.reasoner.infer(&prompt).await?;
            let text = text.trim();
            if text.is_empty() {
                return Err(CapabilityError::malformed("empty summary"));
            }
            Ok(text.to_string())
        })
        .await;

        match outcome {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "Summary unavailable, omitting it");
                None
            }
        }
    }
}

/// Results must be keyed by exactly the generated sub-questions
fn check_coverage(
    sub_questions: &[SubQuestion],
    results: &IndexMap<SubQuestionId, SynthesisResult>,
) -> Result<(), PipelineError> {
    let expected: HashSet<SubQuestionId> = sub_questions.iter().map(|s| s.id).collect();

    let missing: Vec<SubQuestionId> = sub_questions
        .iter()
        .map(|s| s.id)
        .filter(|id| !results.contains_key(id))
        .collect();
    let unexpected: Vec<SubQuestionId> = results
        .keys()
        .copied()
        .filter(|id| !expected.contains(id))
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::IncompleteInput {
            missing,
            unexpected,
        })
    }
}
