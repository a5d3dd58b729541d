pub mod config;
pub mod conversation;
pub mod errors;
pub mod extractor;
pub mod intent;
pub mod router;
pub mod topology;

pub use conversation::{ConversationState, Message, Participant, Role, USER_SOURCE};
pub use errors::BatchError;
pub use extractor::{extract_final_payload, ActionPayload, ExtractionError};
pub use intent::{normalize_intents, IntentKind, IntentRequest, RawIntentRecord};
pub use router::{route, ConversationPhase, RoutingDecision};
pub use topology::{Topology, TopologyError, COMPLETION_SENTINEL};
