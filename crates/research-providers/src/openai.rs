//! OpenAI-compatible chat-completions reasoner
//!
//! Works against OpenAI and any server exposing `/chat/completions`
//! (vLLM, Ollama, LM Studio). Local endpoints may run without an API key.

use crate::error::{retry_after_secs, snippet, ProviderError};
use async_trait::async_trait;
use research_core::{CapabilityError, Prompt, Reasoner};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Reasoner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// API root, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Whole-request timeout
    pub request_timeout_secs: u64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ReasonerConfig {
    fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }
}

/// Reasoner backed by a chat-completions endpoint
pub struct OpenAiReasoner {
    client: reqwest::Client,
    config: ReasonerConfig,
    api_key: Option<String>,
}

impl std::fmt::Debug for OpenAiReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiReasoner")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiReasoner {
    /// Create reasoner, reading the API key from `config.api_key_env`
    ///
    /// # Errors
    /// - `ProviderError::MissingApiKey` if the variable is unset and the
    ///   endpoint is not local
    /// - `ProviderError::Client` if the HTTP client cannot be built
    pub fn new(config: ReasonerConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() && !config.is_local() {
            return Err(ProviderError::MissingApiKey(config.api_key_env.clone()));
        }
        if api_key.is_none() {
            tracing::debug!("No API key set for local endpoint; sending unauthenticated requests");
        }

        Self::with_api_key(config, api_key)
    }

    /// Create reasoner with an explicit API key (`None` for unauthenticated endpoints)
    ///
    /// # Errors
    /// `ProviderError::Client` if the HTTP client cannot be built
    pub fn with_api_key(
        config: ReasonerConfig,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ProviderError::Client)?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = self.endpoint();
        let body = request_body(&self.config, prompt);
        let timeout_secs = self.config.request_timeout_secs;

        tracing::debug!(
            url = %url,
            model = %self.config.model,
            kind = ?prompt.kind,
            "Sending completion request"
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout_secs))?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout_secs))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: snippet(&text),
                retry_after_secs: retry_after,
            });
        }

        parse_completion(&text)
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn infer(&self, prompt: &Prompt) -> Result<String, CapabilityError> {
        self.complete(prompt).await.map_err(CapabilityError::from)
    }
}

/// Chat-completions request body for a prompt
#[must_use]
pub fn request_body(config: &ReasonerConfig, prompt: &Prompt) -> Value {
    json!({
        "model": config.model,
        "temperature": config.temperature,
        "stream": false,
        "messages": [
            { "role": "system", "content": prompt.system },
            { "role": "user", "content": prompt.user },
        ],
    })
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Extract `choices[0].message.content`
///
/// # Errors
/// `ProviderError::Parse` on invalid JSON, no choices or empty content
pub fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let completion: Completion = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("invalid completion JSON: {e}")))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("completion has no choices".into()))?
        .message
        .content
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(ProviderError::Parse("completion content is empty".into()));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use research_core::PromptKind;

    #[test]
    fn request_body_carries_both_messages() {
        let config = ReasonerConfig::default();
        let prompt = Prompt::new(PromptKind::Summarize, "be brief", "summarize this");
        let body = request_body(&config, &prompt);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["content"], "summarize this");
    }

    #[test]
    fn parses_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Hello");
    }

    #[test]
    fn empty_content_is_a_parse_error() {
        let empty = r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#;
        let null = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let none = r#"{"choices":[]}"#;
        for body in [empty, null, none, "not json"] {
            let err = parse_completion(body).unwrap_err();
            assert!(matches!(
                CapabilityError::from(err),
                CapabilityError::MalformedResponse { .. }
            ));
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let reasoner = OpenAiReasoner::with_api_key(
            ReasonerConfig {
                base_url: "http://localhost:11434/v1/".into(),
                ..ReasonerConfig::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(reasoner.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn remote_endpoint_requires_key() {
        let config = ReasonerConfig {
            api_key_env: "RESEARCH_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..ReasonerConfig::default()
        };
        assert!(matches!(
            OpenAiReasoner::new(config),
            Err(ProviderError::MissingApiKey(_))
        ));
    }

    #[test]
    fn local_endpoint_allows_missing_key() {
        let config = ReasonerConfig {
            base_url: "http://127.0.0.1:8000/v1".into(),
            api_key_env: "RESEARCH_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..ReasonerConfig::default()
        };
        assert!(OpenAiReasoner::new(config).is_ok());
    }
}
