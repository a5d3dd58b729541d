use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use voxact_core::config::{AppConfig, RoutingConfig};
use voxact_core::errors::BatchError;
use voxact_core::extractor::ActionPayload;
use voxact_core::intent::normalize_intents;
use voxact_core::topology::Topology;

use crate::classifier::IntentClassifier;
use crate::conversation::{build_responders, ConversationRunner};
use crate::llm::{HttpLlmClient, LlmClient, LlmError};
use crate::tools::{ToolRegistry, YouTubeSearchTool};

/// The batch pipeline: one utterance in, a list of action payloads out.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    routing: RoutingConfig,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, routing: RoutingConfig) -> Self {
        Self { llm, tools, routing }
    }

    /// Wires the runtime from configuration: the HTTP-backed LLM client plus
    /// the YouTube search tool when a key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_config(&config.llm)?);

        let mut tools = ToolRegistry::default();
        if let Some(api_key) = config.youtube.api_key.clone() {
            tools.register(YouTubeSearchTool::new(
                reqwest::Client::new(),
                api_key,
                config.youtube.max_results,
            ));
        }

        Ok(Self::new(llm, Arc::new(tools), config.routing.clone()))
    }

    /// Classify, normalize, build one topology per intent, drive the
    /// conversations in parallel bounded by `max_parallel_intents`, and
    /// collect surviving payloads in classifier order.
    ///
    /// Per-intent failures are logged and contained; only a batch with zero
    /// recognized intents or zero surviving payloads is an error.
    pub async fn execute_prompt(&self, prompt: &str) -> Result<Vec<ActionPayload>, BatchError> {
        let classifier = IntentClassifier::new(
            self.llm.clone(),
            Duration::from_secs(self.routing.classify_timeout_secs),
        );
        let records = classifier.classify(prompt).await;
        let requests = normalize_intents(&records);
        if requests.is_empty() {
            return Err(BatchError::IntentNotRecognized);
        }

        let request_count = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.routing.max_parallel_intents as usize));
        let mut tasks = JoinSet::new();

        for (slot, request) in requests.into_iter().enumerate() {
            let topology = match Topology::build(request.intent, request.keywords) {
                Ok(topology) => Arc::new(topology),
                Err(error) => {
                    warn!(
                        event_name = "runtime.topology_skipped",
                        intent = request.intent.as_str(),
                        error = %error,
                        "topology build failed; skipping intent"
                    );
                    continue;
                }
            };

            let llm = self.llm.clone();
            let tools = self.tools.clone();
            let semaphore = semaphore.clone();
            let max_turns = self.routing.max_turns;
            let arbitration = self.routing.arbitration;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (slot, None),
                };

                let correlation_id = Uuid::new_v4();
                let intent = topology.intent;
                info!(
                    event_name = "runtime.conversation_started",
                    correlation_id = %correlation_id,
                    intent = intent.as_str(),
                    keywords = topology.keywords.len(),
                    "conversation started"
                );

                let responders = build_responders(&topology, llm, tools);
                let runner = ConversationRunner::new(responders, max_turns, arbitration);
                match runner.run(topology).await {
                    Ok(payload) => {
                        info!(
                            event_name = "runtime.conversation_finished",
                            correlation_id = %correlation_id,
                            intent = intent.as_str(),
                            results = payload.values.len(),
                            "conversation produced a payload"
                        );
                        (slot, Some(payload))
                    }
                    Err(error) => {
                        warn!(
                            event_name = "runtime.conversation_failed",
                            correlation_id = %correlation_id,
                            intent = intent.as_str(),
                            error = %error,
                            "conversation abandoned; other intents continue"
                        );
                        (slot, None)
                    }
                }
            });
        }

        let mut collected: Vec<Option<ActionPayload>> = vec![None; request_count];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, payload)) => collected[slot] = payload,
                Err(error) => {
                    warn!(
                        event_name = "runtime.conversation_join_failed",
                        error = %error,
                        "conversation task did not complete"
                    );
                }
            }
        }

        let actions: Vec<ActionPayload> = collected.into_iter().flatten().collect();
        if actions.is_empty() {
            return Err(BatchError::NoActionsProduced);
        }

        Ok(actions)
    }
}
