use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use voxact_core::config::Arbitration;
use voxact_core::conversation::{ConversationState, Message, Role, USER_SOURCE};
use voxact_core::extractor::{extract_final_payload, ActionPayload, ExtractionError};
use voxact_core::intent::IntentKind;
use voxact_core::router::{phase, route};
use voxact_core::topology::{Topology, COMPLETION_SENTINEL};

use crate::llm::{LlmClient, LlmError};
use crate::tools::{ToolRegistry, YOUTUBE_SEARCH_TOOL};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("participant `{0}` has no responder")]
    UnknownSpeaker(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Produces one participant's next utterance from the visible transcript.
#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &str;
    async fn respond(&self, history: &[Message]) -> Result<String, LlmError>;
}

pub struct LlmResponder {
    name: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
}

impl LlmResponder {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self { name: name.into(), system_prompt: system_prompt.into(), llm }
    }
}

fn render_transcript(history: &[Message]) -> String {
    let mut rendered = String::new();
    for message in history {
        rendered.push_str(&message.source);
        rendered.push_str(": ");
        rendered.push_str(&message.text);
        rendered.push('\n');
    }
    rendered
}

#[async_trait]
impl Responder for LlmResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, history: &[Message]) -> Result<String, LlmError> {
        let prompt = format!(
            "Conversation so far:\n{}\nReply as {}.",
            render_transcript(history),
            self.name
        );
        self.llm.complete(&self.system_prompt, &prompt).await
    }
}

/// Wraps a responder with per-keyword tool lookups: observations gathered
/// before the turn are appended to the prompt. A failing lookup is logged
/// and skipped; the turn still happens.
pub struct ToolAssistedResponder {
    inner: LlmResponder,
    tools: Arc<ToolRegistry>,
    tool_name: &'static str,
    keywords: Vec<String>,
}

impl ToolAssistedResponder {
    pub fn new(
        inner: LlmResponder,
        tools: Arc<ToolRegistry>,
        tool_name: &'static str,
        keywords: Vec<String>,
    ) -> Self {
        Self { inner, tools, tool_name, keywords }
    }
}

#[async_trait]
impl Responder for ToolAssistedResponder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn respond(&self, history: &[Message]) -> Result<String, LlmError> {
        let Some(tool) = self.tools.get(self.tool_name) else {
            return self.inner.respond(history).await;
        };

        let mut observations = Vec::new();
        for keyword in &self.keywords {
            match tool.execute(json!({ "query": keyword })).await {
                Ok(result) => observations.push(format!("{keyword}: {result}")),
                Err(error) => {
                    warn!(
                        event_name = "conversation.tool_failed",
                        tool = self.tool_name,
                        keyword = %keyword,
                        error = %error,
                        "tool call failed; continuing without its observation"
                    );
                }
            }
        }

        if observations.is_empty() {
            return self.inner.respond(history).await;
        }

        let prompt = format!(
            "Conversation so far:\n{}\nTool observations:\n{}\nReply as {} using the observations.",
            render_transcript(history),
            observations.join("\n"),
            self.inner.name(),
        );
        self.inner.llm.complete(&self.inner.system_prompt, &prompt).await
    }
}

/// Builds the LLM-backed responder set for a topology. The play specialist
/// gets search-tool assistance when the tool is registered.
pub fn build_responders(
    topology: &Topology,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
) -> Vec<Arc<dyn Responder>> {
    topology
        .participants()
        .map(|participant| {
            let brief = topology.brief_for(&participant.name).unwrap_or_default();
            let system_prompt = format!(
                "{}\nYou are {}. Your responsibility: {}",
                topology.instruction, participant.name, brief
            );
            let inner = LlmResponder::new(participant.name.clone(), system_prompt, llm.clone());

            if participant.role == Role::Specialist
                && topology.intent == IntentKind::Play
                && tools.get(YOUTUBE_SEARCH_TOOL).is_some()
            {
                Arc::new(ToolAssistedResponder::new(
                    inner,
                    tools.clone(),
                    YOUTUBE_SEARCH_TOOL,
                    topology.keywords.clone(),
                )) as Arc<dyn Responder>
            } else {
                Arc::new(inner) as Arc<dyn Responder>
            }
        })
        .collect()
}

/// Drives one topology's conversation to a terminal state.
pub struct ConversationRunner {
    responders: HashMap<String, Arc<dyn Responder>>,
    max_turns: u32,
    arbitration: Arbitration,
}

impl ConversationRunner {
    pub fn new(
        responders: Vec<Arc<dyn Responder>>,
        max_turns: u32,
        arbitration: Arbitration,
    ) -> Self {
        let responders = responders
            .into_iter()
            .map(|responder| (responder.name().to_string(), responder))
            .collect();
        Self { responders, max_turns, arbitration }
    }

    /// Seeds the transcript with the rendered instruction as the user turn,
    /// then loops: check for the sentinel, route, arbitrate, await the
    /// speaker(s), append. Bounded by `max_turns`; hitting the cap falls
    /// through to extraction, which fails cleanly when no sentinel appeared.
    pub async fn run(&self, topology: Arc<Topology>) -> Result<ActionPayload, ConversationError> {
        let mut state = ConversationState::new(topology.clone());
        state.append(USER_SOURCE, topology.instruction.clone());

        for _ in 0..self.max_turns {
            let terminated = state
                .last()
                .map(|message| {
                    message.source != USER_SOURCE && message.text.contains(COMPLETION_SENTINEL)
                })
                .unwrap_or(false);
            if terminated {
                break;
            }

            let decision = route(&topology, state.messages());
            debug!(
                event_name = "conversation.routed",
                intent = topology.intent.as_str(),
                phase = ?phase(&topology, state.messages()),
                eligible = ?decision.eligible_speakers,
                "routing decision computed"
            );

            let speakers: Vec<String> = match self.arbitration {
                Arbitration::First => decision.eligible_speakers.into_iter().take(1).collect(),
                Arbitration::All => decision.eligible_speakers,
            };

            for speaker in speakers {
                let Some(responder) = self.responders.get(&speaker) else {
                    return Err(ConversationError::UnknownSpeaker(speaker));
                };
                let text = responder.respond(state.messages()).await?;
                state.append(speaker, text);
            }
        }

        Ok(extract_final_payload(state.messages())?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use voxact_core::config::Arbitration;
    use voxact_core::conversation::{Message, Participant, Role};
    use voxact_core::intent::IntentKind;
    use voxact_core::topology::{Topology, COMPLETION_SENTINEL};

    use crate::llm::LlmError;

    use super::{ConversationError, ConversationRunner, Responder};

    struct ScriptedResponder {
        name: String,
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedResponder {
        fn with_script(name: &str, replies: Vec<&str>) -> Arc<dyn Responder> {
            Arc::new(Self {
                name: name.to_string(),
                replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            })
        }
    }

    #[async_trait]
    impl Responder for ScriptedResponder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn respond(&self, _history: &[Message]) -> Result<String, LlmError> {
            let mut replies = self.replies.lock().await;
            Ok(replies.pop_front().unwrap_or_else(|| "still working".to_string()))
        }
    }

    fn play_topology() -> Arc<Topology> {
        Arc::new(
            Topology::build(IntentKind::Play, vec!["song A".to_string()])
                .expect("topology should build"),
        )
    }

    fn two_specialist_topology() -> Arc<Topology> {
        Arc::new(Topology {
            intent: IntentKind::Play,
            keywords: vec!["song".to_string()],
            coordinator: Participant {
                name: "PlayPlannerAgent".to_string(),
                role: Role::Coordinator,
            },
            specialists: vec![
                Participant { name: "S1".to_string(), role: Role::Specialist },
                Participant { name: "S2".to_string(), role: Role::Specialist },
            ],
            result_key: "open_webbrowser".to_string(),
            instruction: "resolve the song".to_string(),
        })
    }

    #[tokio::test]
    async fn delegation_round_trip_produces_the_final_payload() {
        let coordinator = ScriptedResponder::with_script(
            "PlayPlannerAgent",
            vec![
                "YouTubeVideoSearcherAgent, find a watch URL for song A.",
                &format!(
                    "{{\"open_webbrowser\": [\"https://www.youtube.com/watch?v=abc\"]}}\n{COMPLETION_SENTINEL}"
                ),
            ],
        );
        let specialist = ScriptedResponder::with_script(
            "YouTubeVideoSearcherAgent",
            vec!["song A -> https://www.youtube.com/watch?v=abc"],
        );

        let runner =
            ConversationRunner::new(vec![coordinator, specialist], 10, Arbitration::First);
        let payload = runner.run(play_topology()).await.expect("conversation should finish");

        assert_eq!(payload.result_key, "open_webbrowser");
        assert_eq!(payload.values, vec!["https://www.youtube.com/watch?v=abc"]);
    }

    #[tokio::test]
    async fn turn_cap_without_sentinel_fails_extraction_cleanly() {
        let coordinator = ScriptedResponder::with_script(
            "PlayPlannerAgent",
            vec!["YouTubeVideoSearcherAgent, look this up."],
        );
        let specialist = ScriptedResponder::with_script(
            "YouTubeVideoSearcherAgent",
            vec!["no luck yet", "still nothing"],
        );

        let runner = ConversationRunner::new(vec![coordinator, specialist], 4, Arbitration::First);
        let error = runner
            .run(play_topology())
            .await
            .err()
            .expect("capped conversation must not produce a payload");

        assert!(matches!(error, ConversationError::Extraction(_)));
    }

    #[tokio::test]
    async fn invite_all_arbitration_lets_every_eligible_speaker_reply_in_order() {
        // The coordinator's first message names nobody and carries no payload,
        // so the fallback rule invites the coordinator plus both silent
        // specialists; `All` arbitration gives each of them the turn.
        let coordinator = ScriptedResponder::with_script(
            "PlayPlannerAgent",
            vec![
                "let me think about the song first",
                "collecting partial results",
                &format!("{{\"open_webbrowser\": [\"https://a\"]}}\n{COMPLETION_SENTINEL}"),
            ],
        );
        let first = ScriptedResponder::with_script("S1", vec!["S1 result"]);
        let second = ScriptedResponder::with_script("S2", vec!["S2 result"]);

        let runner =
            ConversationRunner::new(vec![coordinator, first, second], 10, Arbitration::All);
        let payload = runner
            .run(two_specialist_topology())
            .await
            .expect("conversation should finish");

        assert_eq!(payload.values, vec!["https://a"]);
    }

    #[tokio::test]
    async fn a_speaker_without_a_responder_is_an_error() {
        let coordinator = ScriptedResponder::with_script(
            "PlayPlannerAgent",
            vec!["YouTubeVideoSearcherAgent, take over."],
        );

        let runner = ConversationRunner::new(vec![coordinator], 10, Arbitration::First);
        let error = runner.run(play_topology()).await.err().expect("missing responder");

        assert!(matches!(
            error,
            ConversationError::UnknownSpeaker(name) if name == "YouTubeVideoSearcherAgent"
        ));
    }
}
