use std::collections::HashSet;

use crate::conversation::{Message, USER_SOURCE};
use crate::topology::{Topology, COMPLETION_SENTINEL};

/// The ordered set of participants allowed to produce the next message.
/// Recomputed from scratch on every turn; the transcript is the only state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingDecision {
    pub eligible_speakers: Vec<String>,
}

impl RoutingDecision {
    fn solo(name: &str) -> Self {
        Self { eligible_speakers: vec![name.to_string()] }
    }
}

/// Conversation phase, derived on demand from the transcript. Used for
/// logging and driver bookkeeping, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationPhase {
    AwaitingFirstPlan,
    SpecialistsPending,
    PlanReview,
    Terminated,
}

/// Computes who may speak next from the transcript alone.
///
/// Rules, in priority order:
/// 1. empty history, or the last message came from the user: the coordinator
///    opens the conversation;
/// 2. the last message carries the completion sentinel: the coordinator is
///    returned so the driving loop can recognize termination and stop;
/// 3. a coordinator message naming specialists hands off to exactly those
///    specialists, in topology order;
/// 4. a coordinator message with a `{`..`}` payload but no sentinel routes
///    back to the coordinator, forcing it to finish or revise;
/// 5. after any specialist message, control returns to the coordinator;
/// 6. otherwise the coordinator plus every specialist that has not yet
///    spoken, coordinator first.
///
/// Never errors and never returns an empty set; malformed text degrades to
/// the fallback rule. Whether "eligible" means pick-first or invite-all is
/// the driver's arbitration policy, not decided here.
pub fn route(topology: &Topology, history: &[Message]) -> RoutingDecision {
    let coordinator = topology.coordinator.name.as_str();

    let Some(last) = history.last() else {
        return RoutingDecision::solo(coordinator);
    };

    if last.source == USER_SOURCE {
        return RoutingDecision::solo(coordinator);
    }

    // The termination signal outranks anything else in the message text.
    if last.text.contains(COMPLETION_SENTINEL) {
        return RoutingDecision::solo(coordinator);
    }

    if last.source == coordinator {
        let mentioned = mentioned_specialists(topology, &last.text);
        if !mentioned.is_empty() {
            return RoutingDecision { eligible_speakers: mentioned };
        }
        if last.text.contains('{') && last.text.contains('}') {
            return RoutingDecision::solo(coordinator);
        }
    } else if topology.specialists.iter().any(|specialist| specialist.name == last.source) {
        return RoutingDecision::solo(coordinator);
    }

    let spoken: HashSet<&str> = history.iter().map(|message| message.source.as_str()).collect();
    let mut eligible = vec![coordinator.to_string()];
    eligible.extend(
        topology
            .specialists
            .iter()
            .filter(|specialist| !spoken.contains(specialist.name.as_str()))
            .map(|specialist| specialist.name.clone()),
    );

    RoutingDecision { eligible_speakers: eligible }
}

/// Derives the conceptual phase for the same transcript `route` sees.
pub fn phase(topology: &Topology, history: &[Message]) -> ConversationPhase {
    let Some(last) = history.last() else {
        return ConversationPhase::AwaitingFirstPlan;
    };

    if last.text.contains(COMPLETION_SENTINEL) && last.source != USER_SOURCE {
        return ConversationPhase::Terminated;
    }
    if last.source == USER_SOURCE {
        return ConversationPhase::AwaitingFirstPlan;
    }
    if last.source == topology.coordinator.name
        && !mentioned_specialists(topology, &last.text).is_empty()
    {
        return ConversationPhase::SpecialistsPending;
    }

    ConversationPhase::PlanReview
}

/// Closed-set scan: each known specialist name is checked as a literal
/// substring of the message text, in topology declaration order.
fn mentioned_specialists(topology: &Topology, text: &str) -> Vec<String> {
    topology
        .specialists
        .iter()
        .filter(|specialist| text.contains(specialist.name.as_str()))
        .map(|specialist| specialist.name.clone())
        .collect()
}
