use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use voxact_core::intent::RawIntentRecord;

use crate::llm::LlmClient;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You classify a user's utterance into desktop action intents.
Supported intents: \"play\" (play media), \"open\" (open a website or resource), \
\"execute\" (launch a program).
Respond with ONLY a JSON array of objects of the form \
{\"intent\": \"<label>\", \"keywords\": [\"...\"]}. Emit one object per intent, \
keywords in utterance order. Respond with [] when no supported intent applies.";

/// Turns one utterance into raw classifier records under a hard deadline.
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Timeouts, transport failures, and unparseable replies all degrade to
    /// zero records. Callers treat an empty list as "intent not recognized";
    /// classification never surfaces an error of its own.
    pub async fn classify(&self, prompt: &str) -> Vec<RawIntentRecord> {
        let completion = self.llm.complete(CLASSIFIER_SYSTEM_PROMPT, prompt);
        let reply = match tokio::time::timeout(self.timeout, completion).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(error)) => {
                warn!(
                    event_name = "classify.llm_failed",
                    error = %error,
                    "intent classification call failed"
                );
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    event_name = "classify.timeout",
                    timeout_secs = self.timeout.as_secs(),
                    "intent classification timed out"
                );
                return Vec::new();
            }
        };

        parse_records(&reply)
    }
}

fn parse_records(reply: &str) -> Vec<RawIntentRecord> {
    let body = strip_code_fences(reply.trim());
    match serde_json::from_str::<Vec<RawIntentRecord>>(body) {
        Ok(records) => records,
        Err(error) => {
            warn!(
                event_name = "classify.parse_failed",
                error = %error,
                "classifier reply was not a JSON record list"
            );
            Vec::new()
        }
    }
}

/// Model replies often arrive wrapped in a triple-backtick fence, optionally
/// tagged with a language. Returns the fenced body, or the input unchanged.
fn strip_code_fences(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.find("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::llm::{LlmClient, LlmError};

    use super::{strip_code_fences, IntentClassifier};

    struct CannedLlm {
        reply: Result<String, String>,
        delay: Duration,
    }

    impl CannedLlm {
        fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), delay: Duration::ZERO }
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone().map_err(LlmError::Transport)
        }
    }

    #[test]
    fn strips_fences_with_and_without_language_tags() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```json\n[1]"), "[1]");
        assert_eq!(strip_code_fences("[1]"), "[1]");
    }

    #[tokio::test]
    async fn parses_fenced_record_lists() {
        let classifier = IntentClassifier::new(
            Arc::new(CannedLlm::replying(
                "```json\n[{\"intent\": \"play\", \"keywords\": [\"song A\"]}]\n```",
            )),
            Duration::from_secs(10),
        );

        let records = classifier.classify("play song A").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intent.as_deref(), Some("play"));
    }

    #[tokio::test]
    async fn malformed_replies_degrade_to_zero_records() {
        let classifier = IntentClassifier::new(
            Arc::new(CannedLlm::replying("not json at all")),
            Duration::from_secs(10),
        );

        assert!(classifier.classify("play something").await.is_empty());
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_zero_records() {
        let classifier = IntentClassifier::new(
            Arc::new(CannedLlm { reply: Err("down".to_string()), delay: Duration::ZERO }),
            Duration::from_secs(10),
        );

        assert!(classifier.classify("play something").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_overrun_degrades_to_zero_records() {
        let classifier = IntentClassifier::new(
            Arc::new(CannedLlm {
                reply: Ok("[]".to_string()),
                delay: Duration::from_secs(30),
            }),
            Duration::from_secs(10),
        );

        assert!(classifier.classify("play something").await.is_empty());
    }
}
