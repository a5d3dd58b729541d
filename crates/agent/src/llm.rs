use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use voxact_core::config::{LlmConfig, LlmProvider};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport failed: {0}")]
    Transport(String),
    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response was malformed: {0}")]
    MalformedResponse(String),
    #[error("llm client could not be constructed: {0}")]
    Build(String),
}

/// Seam to the model backends. Each participant turn and the classifier call
/// go through this trait; tests substitute scripted implementations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
}

/// Bounded exponential backoff between retryable completion attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// HTTP-backed client for the three supported providers. Requests carry a
/// per-call timeout; retryable failures back off per `RetryPolicy`.
pub struct HttpLlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    model: String,
    api_key: Option<SecretString>,
    base_url: Option<String>,
    retry: RetryPolicy,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Build(error.to_string()))?;

        Ok(Self {
            http,
            provider: config.provider,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            retry: RetryPolicy { max_retries: config.max_retries, ..RetryPolicy::default() },
        })
    }

    fn endpoint(&self) -> String {
        let (default_base, path) = match self.provider {
            LlmProvider::OpenAi => ("https://api.openai.com", "/v1/chat/completions"),
            LlmProvider::Anthropic => ("https://api.anthropic.com", "/v1/messages"),
            LlmProvider::Ollama => ("http://localhost:11434", "/api/chat"),
        };
        let base = self.base_url.as_deref().unwrap_or(default_base).trim_end_matches('/');
        format!("{base}{path}")
    }

    async fn attempt(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let body = request_body(self.provider, &self.model, system_prompt, user_prompt);
        let mut request = self.http.post(self.endpoint()).json(&body);

        match self.provider {
            LlmProvider::OpenAi => {
                if let Some(key) = &self.api_key {
                    request = request.bearer_auth(key.expose_secret());
                }
            }
            LlmProvider::Anthropic => {
                if let Some(key) = &self.api_key {
                    request = request.header("x-api-key", key.expose_secret());
                }
                request = request.header("anthropic-version", ANTHROPIC_VERSION);
            }
            LlmProvider::Ollama => {}
        }

        let response =
            request.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
        parse_completion(self.provider, &value)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.attempt(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(error) => {
                    if attempt >= self.retry.max_retries || !is_retryable(&error) {
                        return Err(error);
                    }
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %error,
                        "llm completion failed; backing off before retry"
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn request_body(
    provider: LlmProvider,
    model: &str,
    system_prompt: &str,
    user_prompt: &str,
) -> Value {
    match provider {
        LlmProvider::OpenAi => json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        }),
        LlmProvider::Anthropic => json!({
            "model": model,
            "max_tokens": 1024,
            "system": system_prompt,
            "messages": [{"role": "user", "content": user_prompt}],
        }),
        LlmProvider::Ollama => json!({
            "model": model,
            "stream": false,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        }),
    }
}

fn parse_completion(provider: LlmProvider, value: &Value) -> Result<String, LlmError> {
    let text = match provider {
        LlmProvider::OpenAi => value.pointer("/choices/0/message/content").and_then(Value::as_str),
        LlmProvider::Anthropic => value.pointer("/content/0/text").and_then(Value::as_str),
        LlmProvider::Ollama => value.pointer("/message/content").and_then(Value::as_str),
    };

    text.map(str::to_owned).ok_or_else(|| {
        LlmError::MalformedResponse(format!("no completion text in {provider:?} response"))
    })
}

fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::Transport(_) => true,
        LlmError::Status { status, .. } => *status == 429 || *status >= 500,
        LlmError::MalformedResponse(_) | LlmError::Build(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use voxact_core::config::LlmProvider;

    use super::{is_retryable, parse_completion, request_body, LlmError, RetryPolicy};

    #[test]
    fn backoff_grows_exponentially_up_to_the_cap() {
        let policy = RetryPolicy { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 };

        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(2).as_millis(), 1_000);
        assert_eq!(policy.backoff(10).as_millis(), 5_000);
    }

    #[test]
    fn parses_openai_completion_shape() {
        let value = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        let text =
            parse_completion(LlmProvider::OpenAi, &value).expect("completion should parse");
        assert_eq!(text, "hello");
    }

    #[test]
    fn parses_anthropic_completion_shape() {
        let value = json!({"content": [{"type": "text", "text": "hello"}]});
        let text =
            parse_completion(LlmProvider::Anthropic, &value).expect("completion should parse");
        assert_eq!(text, "hello");
    }

    #[test]
    fn parses_ollama_completion_shape() {
        let value = json!({"message": {"role": "assistant", "content": "hello"}});
        let text =
            parse_completion(LlmProvider::Ollama, &value).expect("completion should parse");
        assert_eq!(text, "hello");
    }

    #[test]
    fn missing_completion_text_is_malformed() {
        let value = json!({"choices": []});
        let error = parse_completion(LlmProvider::OpenAi, &value)
            .err()
            .expect("empty choices should not parse");
        assert!(matches!(error, LlmError::MalformedResponse(_)));
    }

    #[test]
    fn anthropic_request_carries_system_prompt_at_top_level() {
        let body = request_body(LlmProvider::Anthropic, "model-x", "system here", "user here");
        assert_eq!(body["system"], "system here");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn only_transport_and_server_side_failures_are_retryable() {
        assert!(is_retryable(&LlmError::Transport("reset".to_string())));
        assert!(is_retryable(&LlmError::Status { status: 429, body: String::new() }));
        assert!(is_retryable(&LlmError::Status { status: 503, body: String::new() }));
        assert!(!is_retryable(&LlmError::Status { status: 400, body: String::new() }));
        assert!(!is_retryable(&LlmError::MalformedResponse("bad json".to_string())));
    }
}
