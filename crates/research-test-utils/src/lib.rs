//! Testing utilities for the research workspace
//!
//! Scripted capability fakes, fixtures, and helpers shared by integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use research_core::{
    CapabilityError, Paper, PaperSource, PipelineConfig, Prompt, PromptKind, Reasoner,
    RetryConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type Handler = Arc<dyn Fn(&Prompt) -> Result<String, CapabilityError> + Send + Sync>;
pub type DelayFn = Arc<dyn Fn(&Prompt) -> Duration + Send + Sync>;

/// Reasoner answering from per-stage scripts
///
/// Stages without a script fail with a permanent error so an unexpected call
/// shows up as a degraded result rather than a hang.
#[derive(Default)]
pub struct ScriptedReasoner {
    handlers: HashMap<PromptKind, Handler>,
    delay: Option<DelayFn>,
    calls: Mutex<HashMap<PromptKind, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a stage with a handler
    #[must_use]
    pub fn on<F>(mut self, kind: PromptKind, handler: F) -> Self
    where
        F: Fn(&Prompt) -> Result<String, CapabilityError> + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Script a stage with a fixed reply
    #[must_use]
    pub fn reply(self, kind: PromptKind, text: &str) -> Self {
        let text = text.to_string();
        self.on(kind, move |_| Ok(text.clone()))
    }

    /// Script a stage to always fail
    #[must_use]
    pub fn fail(self, kind: PromptKind, error: CapabilityError) -> Self {
        self.on(kind, move |_| Err(error.clone()))
    }

    /// Sleep before answering (tokio time, so paused-clock tests stay fast)
    #[must_use]
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&Prompt) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(delay));
        self
    }

    /// Number of calls received for a stage
    pub fn calls(&self, kind: PromptKind) -> usize {
        self.calls.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Number of calls received across all stages
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn infer(&self, prompt: &Prompt) -> Result<String, CapabilityError> {
        *self.calls.lock().entry(prompt.kind).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = &self.delay {
            let wait = delay(prompt);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        match self.handlers.get(&prompt.kind) {
            Some(handler) => handler(prompt),
            None => Err(CapabilityError::permanent(format!(
                "no script for {:?}",
                prompt.kind
            ))),
        }
    }
}

/// Sub-question text of a synthesis prompt
pub fn sub_question_of(prompt: &Prompt) -> Option<&str> {
    prompt
        .user
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("Sub-question: "))
}

/// Paper source serving a fixed list
#[derive(Default)]
pub struct StaticPaperSource {
    papers: Vec<Paper>,
    error: Option<CapabilityError>,
    queries: Mutex<Vec<String>>,
}

impl StaticPaperSource {
    pub fn new(papers: Vec<Paper>) -> Self {
        Self {
            papers,
            ..Self::default()
        }
    }

    /// Source that never finds anything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Source that always fails with `error`
    pub fn failing(error: CapabilityError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Queries received, in arrival order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl PaperSource for StaticPaperSource {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>, CapabilityError> {
        self.queries.lock().push(query.to_string());
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.papers.iter().take(max_results).cloned().collect()),
        }
    }
}

/// Config with immediate retries and a short call timeout
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::new()
        .with_retry(RetryConfig::immediate(2))
        .with_call_timeout(Duration::from_secs(5))
}

pub const DEEPFAKE_QUESTION: &str = "Compare CNN and transformer based deepfake detection methods";

pub const DEEPFAKE_SUB_QUESTIONS: [&str; 3] = [
    "What CNN-based methods are used for deepfake detection?",
    "What transformer-based methods are used for deepfake detection?",
    "How do CNN and transformer deepfake detectors compare in accuracy and robustness?",
];

pub fn deepfake_papers() -> Vec<Paper> {
    vec![
        Paper::new(
            "1901.08971",
            "FaceForensics++: Learning to Detect Manipulated Facial Images",
            "We train CNN-based detectors such as XceptionNet on a large deepfake benchmark.",
        )
        .with_authors(vec!["Andreas Rossler".into(), "Davide Cozzolino".into()])
        .with_published("2019-01-25"),
        Paper::new(
            "2104.09770",
            "Deepfake Detection with Vision Transformers",
            "Vision transformers capture global inconsistencies in manipulated faces.",
        )
        .with_published("2021-04-20"),
        Paper::new(
            "2206.00001",
            "Benchmarking Deepfake Detectors",
            "We compare CNN and transformer detectors for accuracy and robustness.",
        )
        .with_published("2022-06-01"),
    ]
}

/// Reasoner playing out the deepfake comparison scenario
///
/// Syntheses cite the first paper id listed in their prompt.
pub fn deepfake_reasoner() -> ScriptedReasoner {
    let subs = json_array(&DEEPFAKE_SUB_QUESTIONS);
    ScriptedReasoner::new()
        .reply(
            PromptKind::ClassifyIntent,
            r#"{"intent": "COMPARISON", "confidence": 0.93}"#,
        )
        .reply(PromptKind::Decompose, &subs)
        .on(PromptKind::Synthesize, |prompt| {
            let cited = first_cited_id(prompt).unwrap_or("none");
            let sub = sub_question_of(prompt).unwrap_or("the question");
            Ok(format!("Answer to {sub} [{cited}]"))
        })
        .reply(
            PromptKind::Summarize,
            "CNNs are strong on known manipulations; transformers generalize better.",
        )
}

fn first_cited_id(prompt: &Prompt) -> Option<&str> {
    let start = prompt.user.find('[')? + 1;
    let len = prompt.user[start..].find(']')?;
    Some(&prompt.user[start..start + len])
}

fn json_array(items: &[&str]) -> String {
    serde_json::Value::from(items.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_escapes_quotes() {
        let text = json_array(&["What is \"dropout\"?", "C:\\path"]);
        let parsed: Vec<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec!["What is \"dropout\"?", "C:\\path"]);
    }
}
