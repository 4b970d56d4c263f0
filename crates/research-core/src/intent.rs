//! Intent classification
//!
//! Classification is advisory: it never blocks the pipeline. Unknown labels
//! map to `OTHER`, and exhausted retries yield `OTHER` with confidence 0.

use crate::capability::Reasoner;
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::CapabilityError;
use crate::prompts;
use crate::retry::call_with_retry;
use crate::types::{Intent, IntentLabel, ResearchQuestion};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Confidence assigned when the model replies with a bare label
const BARE_LABEL_CONFIDENCE: f64 = 0.5;

/// Maps a research question to one intent label
pub struct IntentClassifier {
    reasoner: Arc<dyn Reasoner>,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl IntentClassifier {
    /// Create new classifier
    #[must_use]
    pub fn new(reasoner: Arc<dyn Reasoner>, config: &PipelineConfig) -> Self {
        Self {
            reasoner,
            retry: config.retry.clone(),
            call_timeout: config.call_timeout(),
        }
    }

    /// Classify the question
    ///
    /// Never fails: a blank question cannot reach here (see
    /// [`ResearchQuestion::new`]) and capability failures degrade to
    /// [`Intent::fallback`].
    pub async fn classify(&self, question: &ResearchQuestion) -> Intent {
        let prompt = prompts::classify_intent(question);

        let outcome = call_with_retry(&self.retry, self.call_timeout, "classify_intent", || async {
            let text = self.reasoner.infer(&prompt).await?;
            parse_intent_response(&text)
        })
        .await;

        match outcome {
            Ok(intent) => {
                tracing::debug!(
                    label = %intent.label,
                    confidence = intent.confidence,
                    "Classified intent"
                );
                intent
            }
            Err(e) => {
                tracing::warn!(error = %e, "Intent classification unavailable, using OTHER");
                Intent::fallback()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parse a classifier reply
///
/// Accepts a JSON object (optionally fenced) or a bare label. A JSON object
/// naming an unknown label yields `OTHER` with confidence 0.
///
/// # Errors
/// `CapabilityError::MalformedResponse` if neither form can be read
pub fn parse_intent_response(text: &str) -> Result<Intent, CapabilityError> {
    let body = prompts::strip_code_fence(text);

    if let Some(json) = prompts::delimited(body, '{', '}') {
        let raw: RawIntent = serde_json::from_str(json)
            .map_err(|e| CapabilityError::malformed(format!("intent JSON: {e}")))?;

        return Ok(match IntentLabel::parse(&raw.intent) {
            Some(label) => Intent::new(label, raw.confidence.unwrap_or(BARE_LABEL_CONFIDENCE)),
            None => Intent::fallback(),
        });
    }

    let first_line = body.lines().next().unwrap_or_default();
    IntentLabel::parse(first_line)
        .map(|label| Intent::new(label, BARE_LABEL_CONFIDENCE))
        .ok_or_else(|| CapabilityError::malformed(format!("no intent label in {first_line:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MockReasoner, PromptKind};

    fn config() -> PipelineConfig {
        PipelineConfig::new().with_retry(RetryConfig::immediate(3))
    }

    #[test]
    fn parses_json_reply() {
        let intent =
            parse_intent_response(r#"{"intent": "COMPARISON", "confidence": 0.92}"#).unwrap();
        assert_eq!(intent.label, IntentLabel::Comparison);
        assert!((intent.confidence - 0.92).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_fenced_json_reply() {
        let intent =
            parse_intent_response("```json\n{\"intent\": \"survey\", \"confidence\": 2}\n```").unwrap();
        assert_eq!(intent.label, IntentLabel::Survey);
        assert_eq!(intent.confidence, 1.0);
    }

    #[test]
    fn unknown_label_maps_to_other() {
        let intent =
            parse_intent_response(r#"{"intent": "BRAINSTORM", "confidence": 0.8}"#).unwrap();
        assert_eq!(intent, Intent::fallback());
    }

    #[test]
    fn bare_label_is_accepted() {
        let intent = parse_intent_response("Definition\nbecause it asks what X is").unwrap();
        assert_eq!(intent.label, IntentLabel::Definition);
        assert_eq!(intent.confidence, BARE_LABEL_CONFIDENCE);
    }

    #[test]
    fn gibberish_is_malformed() {
        assert!(matches!(
            parse_intent_response("I think it might be several things"),
            Err(CapabilityError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_intent_response("{not json}"),
            Err(CapabilityError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn classify_uses_reasoner() {
        let mut reasoner = MockReasoner::new();
        reasoner
            .expect_infer()
            .withf(|p| p.kind == PromptKind::ClassifyIntent)
            .times(1)
            .returning(|_| Ok(r#"{"intent": "METHOD_LOOKUP", "confidence": 0.7}"#.to_string()));

        let classifier = IntentClassifier::new(Arc::new(reasoner), &config());
        let q = ResearchQuestion::new("How does LoRA fine-tuning work?").unwrap();

        let intent = classifier.classify(&q).await;
        assert_eq!(intent.label, IntentLabel::MethodLookup);
    }

    #[tokio::test]
    async fn malformed_reply_is_retried() {
        let mut reasoner = MockReasoner::new();
        let mut seq = mockall::Sequence::new();
        reasoner
            .expect_infer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("hmm".to_string()));
        reasoner
            .expect_infer()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("SURVEY".to_string()));

        let classifier = IntentClassifier::new(Arc::new(reasoner), &config());
        let q = ResearchQuestion::new("Survey graph neural networks").unwrap();

        assert_eq!(classifier.classify(&q).await.label, IntentLabel::Survey);
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_other() {
        let mut reasoner = MockReasoner::new();
        reasoner
            .expect_infer()
            .times(3)
            .returning(|_| Err(CapabilityError::Timeout { timeout_secs: 60 }));

        let classifier = IntentClassifier::new(Arc::new(reasoner), &config());
        let q = ResearchQuestion::new("anything").unwrap();

        let intent = classifier.classify(&q).await;
        assert_eq!(intent.label, IntentLabel::Other);
        assert_eq!(intent.confidence, 0.0);
    }
}
