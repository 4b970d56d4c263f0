//! Pipeline orchestration
//!
//! Drives one run through classification, decomposition, concurrent
//! synthesis and composition. The pipeline object holds only capabilities
//! and configuration; all per-run state lives inside a single call.

use crate::capability::{PaperSource, Reasoner};
use crate::config::PipelineConfig;
use crate::decomposition::SubQuestionGenerator;
use crate::error::{ConfigError, PipelineError};
use crate::intent::IntentClassifier;
use crate::report::{ReportComposer, ResearchReport};
use crate::state::{RunState, RunTracker};
use crate::synthesis::SynthesisEngine;
use crate::types::{
    Intent, Paper, ResearchQuestion, RunId, RunStats, SubQuestion, SubQuestionId,
    SynthesisResult, SynthesisStatus,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tracing::Instrument;

/// Error detail of syntheses cut off by the pipeline timeout
pub const TIMED_OUT: &str = "timed out";

/// Error detail of syntheses whose task panicked or was cancelled
pub const TASK_TERMINATED: &str = "synthesis task terminated unexpectedly";

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Run identifier
    pub run_id: RunId,
    /// Accepted question text
    pub question: String,
    /// Classified intent
    pub intent: Intent,
    /// Sub-questions in decomposition order
    pub sub_questions: Vec<SubQuestion>,
    /// Synthesis results keyed by sub-question, in decomposition order
    pub synthesis: IndexMap<SubQuestionId, SynthesisResult>,
    /// Validated report
    pub report: ResearchReport,
    /// Fan-in accounting
    pub stats: RunStats,
}

impl PipelineResult {
    /// Check if any synthesis degraded
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.synthesis.values().any(|r| r.status.is_degraded())
    }
}

/// Research pipeline
///
/// Stateless across calls: concurrent runs on one pipeline share nothing but
/// the capabilities.
pub struct ResearchPipeline {
    classifier: IntentClassifier,
    generator: SubQuestionGenerator,
    engine: SynthesisEngine,
    composer: ReportComposer,
    config: PipelineConfig,
}

impl ResearchPipeline {
    /// Create new pipeline
    ///
    /// # Errors
    /// `ConfigError::Invalid` if the configuration fails validation
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        papers: Arc<dyn PaperSource>,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            classifier: IntentClassifier::new(Arc::clone(&reasoner), &config),
            generator: SubQuestionGenerator::new(Arc::clone(&reasoner), &config),
            engine: SynthesisEngine::new(Arc::clone(&reasoner), papers, config.clone()),
            composer: ReportComposer::new(reasoner, &config),
            config,
        })
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline on a question
    ///
    /// # Errors
    /// - `InvalidInput` if the question is blank
    /// - `IncompleteInput` / `InternalConsistency` on contract violations
    pub async fn run(&self, question: &str) -> Result<PipelineResult, PipelineError> {
        self.run_with_pool(question, Vec::new()).await
    }

    /// Run the pipeline with a pre-fetched evidence pool
    ///
    /// # Errors
    /// As [`ResearchPipeline::run`]
    pub async fn run_with_pool(
        &self,
        question: &str,
        pool: Vec<Paper>,
    ) -> Result<PipelineResult, PipelineError> {
        let run_id = RunId::new();
        let span = tracing::info_span!("research_run", %run_id, pool = pool.len());
        self.execute(run_id, question, pool).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: RunId,
        raw_question: &str,
        pool: Vec<Paper>,
    ) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let deadline = self.config.pipeline_timeout().map(|t| started + t);
        let mut tracker = RunTracker::new(run_id);

        let question = match ResearchQuestion::new(raw_question) {
            Ok(question) => question,
            Err(e) => {
                tracker.advance(RunState::Failed)?;
                tracing::warn!(error = %e, "Rejected research question");
                return Err(e);
            }
        };
        tracing::info!("Research run started: {}", question);

        tracker.advance(RunState::Classifying)?;
        let intent = self.classifier.classify(&question).await;
        tracing::info!("Classified intent: {} ({:.2})", intent.label, intent.confidence);

        tracker.advance(RunState::Decomposing)?;
        let sub_questions = self.generator.decompose(&question, &intent).await;
        tracing::info!("Decomposed into {} sub-questions", sub_questions.len());

        tracker.advance(RunState::Synthesizing)?;
        let (synthesis, timed_out) = self.synthesize_all(&sub_questions, pool, deadline).await;

        tracker.advance(RunState::Composing)?;
        let report = self
            .composer
            .compose(&question, &intent, &sub_questions, &synthesis)
            .await?;
        tracker.advance(RunState::Done)?;

        let stats = tally(&synthesis, timed_out, started);
        tracing::info!(
            ok = stats.ok,
            partial = stats.partial,
            failed = stats.failed,
            timed_out = stats.timed_out,
            elapsed_ms = stats.elapsed_ms,
            "Research run completed"
        );

        Ok(PipelineResult {
            run_id,
            question: question.as_str().to_string(),
            intent,
            sub_questions,
            synthesis,
            report,
            stats,
        })
    }

    /// Fan out one task per sub-question, fan in by ordinal
    ///
    /// Returns results in sub-question order plus the number that timed out.
    async fn synthesize_all(
        &self,
        sub_questions: &[SubQuestion],
        pool: Vec<Paper>,
        deadline: Option<Instant>,
    ) -> (IndexMap<SubQuestionId, SynthesisResult>, usize) {
        let pool = Arc::new(pool);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_syntheses));
        let mut tasks = JoinSet::new();
        let mut owners: HashMap<task::Id, SubQuestionId> = HashMap::new();

        for sub_question in sub_questions.iter().cloned() {
            let id = sub_question.id;
            let engine = self.engine.clone();
            let pool = Arc::clone(&pool);
            let semaphore = Arc::clone(&semaphore);
            let span = tracing::info_span!("synthesis", ordinal = id.ordinal());

            let handle = tasks.spawn(
                async move {
                    // Semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = engine.synthesize(&sub_question, &pool).await;
                    (sub_question.id, result)
                }
                .instrument(span),
            );
            owners.insert(handle.id(), id);
        }

        let mut collected: HashMap<SubQuestionId, SynthesisResult> = HashMap::new();
        let mut terminated: HashSet<SubQuestionId> = HashSet::new();
        let mut deadline_hit = false;

        loop {
            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            deadline_hit = true;
                            break;
                        }
                    }
                }
                None => tasks.join_next().await,
            };

            match next {
                Some(Ok((id, result))) => {
                    collected.insert(id, result);
                }
                Some(Err(e)) => {
                    let owner = owners.get(&e.id()).copied();
                    tracing::warn!(
                        ordinal = owner.map(|id| id.ordinal()),
                        error = %e,
                        "Synthesis task terminated abnormally"
                    );
                    terminated.extend(owner);
                }
                None => break,
            }
        }

        if deadline_hit {
            tracing::warn!(
                pending = tasks.len(),
                "Pipeline timeout reached, aborting unfinished syntheses"
            );
            tasks.abort_all();
            // Tasks that finished before the abort keep their results
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((id, result)) => {
                        collected.insert(id, result);
                    }
                    Err(e) if e.is_panic() => {
                        terminated.extend(owners.get(&e.id()).copied());
                    }
                    Err(_) => {}
                }
            }
        }

        let mut timed_out = 0;
        let mut ordered = IndexMap::with_capacity(sub_questions.len());
        for sub_question in sub_questions {
            let id = sub_question.id;
            let result = match collected.remove(&id) {
                Some(result) => result,
                None if deadline_hit && !terminated.contains(&id) => {
                    timed_out += 1;
                    SynthesisResult::failed(id, TIMED_OUT)
                }
                None => SynthesisResult::failed(id, TASK_TERMINATED),
            };
            ordered.insert(id, result);
        }

        (ordered, timed_out)
    }
}

fn tally(
    synthesis: &IndexMap<SubQuestionId, SynthesisResult>,
    timed_out: usize,
    started: Instant,
) -> RunStats {
    let count = |status: SynthesisStatus| synthesis.values().filter(|r| r.status == status).count();

    RunStats {
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        ok: count(SynthesisStatus::Ok),
        partial: count(SynthesisStatus::Partial),
        failed: count(SynthesisStatus::Failed),
        timed_out,
    }
}
