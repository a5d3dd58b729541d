//! Agent runtime - classification and conversation orchestration
//!
//! This crate turns one user utterance into structured desktop actions:
//! - Classifies the utterance into (intent, keyword) pairs (`classifier`)
//! - Builds LLM-backed responders per topology participant (`conversation`)
//! - Drives each conversation with the core turn router until the
//!   coordinator emits the completion sentinel
//! - Runs independent intents' conversations in parallel (`runtime`)
//!
//! The LLM backends are reached through the `LlmClient` seam (`llm`);
//! external lookups go through the `Tool` registry (`tools`). All routing
//! decisions stay in `voxact-core` and are pure functions of the transcript.

pub mod classifier;
pub mod conversation;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use classifier::IntentClassifier;
pub use conversation::{
    build_responders, ConversationError, ConversationRunner, LlmResponder, Responder,
};
pub use llm::{HttpLlmClient, LlmClient, LlmError, RetryPolicy};
pub use runtime::AgentRuntime;
pub use tools::{Tool, ToolRegistry, YouTubeSearchTool};
