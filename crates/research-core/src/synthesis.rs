//! Per-sub-question synthesis
//!
//! Each synthesis gathers its own evidence (paper search plus the caller's
//! pool), asks the reasoner for a grounded answer and classifies the
//! outcome. Failures never escape: they become PARTIAL or FAILED results.

use crate::capability::{PaperSource, Reasoner};
use crate::config::PipelineConfig;
use crate::error::CapabilityError;
use crate::evidence;
use crate::prompts;
use crate::retry::call_with_retry;
use crate::types::{EvidenceItem, Paper, SubQuestion, SynthesisResult};
use std::sync::Arc;

/// Prefix of answers produced without literature support
pub const NO_EVIDENCE_NOTICE: &str =
    "No supporting papers were found for this sub-question; the answer below is not grounded in retrieved literature.";

/// Evidence gathered for one sub-question
#[derive(Debug, Clone, Default)]
struct Gathered {
    items: Vec<EvidenceItem>,
    retrieval_error: Option<CapabilityError>,
}

/// Answers one sub-question from evidence
#[derive(Clone)]
pub struct SynthesisEngine {
    reasoner: Arc<dyn Reasoner>,
    papers: Arc<dyn PaperSource>,
    config: PipelineConfig,
}

impl SynthesisEngine {
    /// Create new engine
    #[must_use]
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        papers: Arc<dyn PaperSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            reasoner,
            papers,
            config,
        }
    }

    /// Synthesize an answer for `sub_question`
    ///
    /// - Evidence found and reasoner answered: OK
    /// - No evidence, or retrieval failed: PARTIAL with a best-effort answer
    /// - Reasoner failed after retries: FAILED with empty text
    pub async fn synthesize(&self, sub_question: &SubQuestion, pool: &[Paper]) -> SynthesisResult {
        let gathered = self.gather_evidence(sub_question, pool).await;
        let id = sub_question.id;

        let prompt = if gathered.items.is_empty() {
            prompts::synthesize_without_evidence(sub_question)
        } else {
            prompts::synthesize(sub_question, &gathered.items)
        };

        let answer = call_with_retry(
            &self.config.retry,
            self.config.call_timeout(),
            "synthesize",
            || async {
                let text = self.reasoner.infer(&prompt).await?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(CapabilityError::malformed("empty synthesis"));
                }
                Ok(text.to_string())
            },
        )
        .await;

        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(sub_question = %id, error = %e, "Synthesis failed");
                return SynthesisResult::failed(id, format!("synthesis failed: {e}"));
            }
        };

        match (gathered.items.is_empty(), gathered.retrieval_error) {
            (true, retrieval_error) => {
                let detail = match retrieval_error {
                    Some(e) => format!("paper retrieval failed: {e}"),
                    None => "no supporting papers found".to_string(),
                };
                tracing::info!(sub_question = %id, %detail, "Synthesis degraded");
                SynthesisResult::partial(
                    id,
                    format!("{NO_EVIDENCE_NOTICE}\n\n{answer}"),
                    Vec::new(),
                    detail,
                )
            }
            (false, Some(e)) => {
                tracing::info!(
                    sub_question = %id,
                    error = %e,
                    "Synthesis used pooled evidence only"
                );
                SynthesisResult::partial(
                    id,
                    answer,
                    gathered.items,
                    format!("paper retrieval failed: {e}"),
                )
            }
            (false, None) => {
                tracing::debug!(
                    sub_question = %id,
                    evidence = gathered.items.len(),
                    "Synthesis complete"
                );
                SynthesisResult::ok(id, answer, gathered.items)
            }
        }
    }

    async fn gather_evidence(&self, sub_question: &SubQuestion, pool: &[Paper]) -> Gathered {
        let search = call_with_retry(
            &self.config.retry,
            self.config.call_timeout(),
            "paper_search",
            || {
                self.papers
                    .search(&sub_question.text, self.config.search_results_per_query)
            },
        )
        .await;

        let (hits, retrieval_error) = match search {
            Ok(hits) => (hits, None),
            Err(e) => {
                tracing::warn!(sub_question = %sub_question.id, error = %e, "Paper search failed");
                (Vec::new(), Some(e))
            }
        };

        let pool_hits =
            evidence::rank_pool(&sub_question.text, pool, self.config.pool_min_similarity);
        let items = evidence::select_evidence(
            &hits,
            &pool_hits,
            self.config.evidence_top_k,
            self.config.excerpt_chars,
        );

        Gathered {
            items,
            retrieval_error,
        }
    }
}
