use std::sync::Arc;

use serde::Serialize;

use crate::topology::Topology;

/// Source label carried by the task-seeding message.
pub const USER_SOURCE: &str = "user";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Specialist,
}

/// A named conversation member. Immutable once its topology is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub name: String,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub source: String,
    pub text: String,
    pub turn_index: u32,
}

/// One intent's in-flight conversation: a shared read-only topology plus an
/// append-only transcript. Created when a topology begins execution and
/// discarded once its result is extracted.
pub struct ConversationState {
    topology: Arc<Topology>,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self { topology, messages: Vec::new() }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Appends the next turn. `turn_index` is assigned here so the history
    /// stays strictly increasing and gapless regardless of who spoke.
    pub fn append(&mut self, source: impl Into<String>, text: impl Into<String>) {
        let source = source.into();
        debug_assert!(
            source == USER_SOURCE || self.topology.contains(&source),
            "message source `{source}` is not part of this conversation's topology"
        );

        let turn_index = self.messages.len() as u32;
        self.messages.push(Message { source, text: text.into(), turn_index });
    }
}
