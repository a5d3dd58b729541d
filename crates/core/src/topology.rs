use tera::{Context, Tera};
use thiserror::Error;

use crate::conversation::{Participant, Role};
use crate::intent::IntentKind;

/// Literal marker the coordinator must emit on its own line at the end of its
/// final message. This is the sole termination signal for a conversation.
pub const COMPLETION_SENTINEL: &str = "#ACTIONSGENERATIONDONE";

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("intent `{intent}` has no keywords after normalization")]
    EmptyKeywords { intent: &'static str },
    #[error("instruction template rendering failed: {0}")]
    Render(#[from] tera::Error),
}

/// Fixed staffing for one intent: who coordinates, who resolves keywords, and
/// what the final payload key is called. A static table, never computed.
struct IntentProfile {
    coordinator: &'static str,
    coordinator_brief: &'static str,
    specialist: &'static str,
    specialist_brief: &'static str,
    result_key: &'static str,
    example_output: &'static str,
}

const PLAY_PROFILE: IntentProfile = IntentProfile {
    coordinator: "PlayPlannerAgent",
    coordinator_brief: "coordinates the team and assembles the final JSON output.",
    specialist: "YouTubeVideoSearcherAgent",
    specialist_brief: "finds a playable watch URL for each keyword.",
    result_key: "open_webbrowser",
    example_output: r#"{"open_webbrowser": [ "https://www.youtube.com/watch?v=xxx", ... ]}"#,
};

const OPEN_PROFILE: IntentProfile = IntentProfile {
    coordinator: "OpenPlannerAgent",
    coordinator_brief: "coordinates the team and assembles the final JSON output.",
    specialist: "SuggestionWebsiteUrlSearchAgent",
    specialist_brief: "determines the best URL for each keyword or topic.",
    result_key: "open_webbrowser",
    example_output: r#"{"open_webbrowser": [ "https://...", ... ]}"#,
};

const EXECUTE_PROFILE: IntentProfile = IntentProfile {
    coordinator: "ExecutePlannerAgent",
    coordinator_brief: "coordinates the team and assembles the final JSON output.",
    specialist: "ExecuteProgramsParameterAgent",
    specialist_brief: "resolves an executable file name for each program keyword.",
    result_key: "execute_programs",
    example_output: r#"{"execute_programs": [ "Photoshop.exe", "Excel.exe", ... ]}"#,
};

fn profile(intent: IntentKind) -> &'static IntentProfile {
    match intent {
        IntentKind::Play => &PLAY_PROFILE,
        IntentKind::Open => &OPEN_PROFILE,
        IntentKind::Execute => &EXECUTE_PROFILE,
    }
}

/// The fixed participant set and rendered instruction for one intent's
/// conversation. Shared read-only across all turns once built.
#[derive(Clone, Debug)]
pub struct Topology {
    pub intent: IntentKind,
    pub keywords: Vec<String>,
    pub coordinator: Participant,
    pub specialists: Vec<Participant>,
    pub result_key: String,
    pub instruction: String,
}

impl Topology {
    /// Assembles the topology for `intent`. Callers must not construct
    /// empty-keyword topologies; that is a normalization bug upstream.
    pub fn build(intent: IntentKind, keywords: Vec<String>) -> Result<Self, TopologyError> {
        if keywords.is_empty() {
            return Err(TopologyError::EmptyKeywords { intent: intent.as_str() });
        }

        let profile = profile(intent);
        let instruction = render_instruction(intent, &keywords, profile)?;

        Ok(Self {
            intent,
            keywords,
            coordinator: Participant {
                name: profile.coordinator.to_string(),
                role: Role::Coordinator,
            },
            specialists: vec![Participant {
                name: profile.specialist.to_string(),
                role: Role::Specialist,
            }],
            result_key: profile.result_key.to_string(),
            instruction,
        })
    }

    /// Coordinator first, then specialists in declaration order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        std::iter::once(&self.coordinator).chain(self.specialists.iter())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.participants().any(|participant| participant.name == name)
    }

    pub fn brief_for(&self, name: &str) -> Option<&'static str> {
        let profile = profile(self.intent);
        if name == profile.coordinator {
            Some(profile.coordinator_brief)
        } else if name == profile.specialist {
            Some(profile.specialist_brief)
        } else {
            None
        }
    }
}

const INSTRUCTION_TEMPLATE: &str = "\
You are working in a team of agent specialists to satisfy a user request.
This session's intent is \"{{ intent }}\" and covers the following keywords:
{% for keyword in keywords %}- {{ keyword }}
{% endfor %}
Roles in this team:
- {{ coordinator }}: {{ coordinator_brief }}
- {{ specialist }}: {{ specialist_brief }}

Session requirements:
- The coordinator breaks the request into one task per keyword and delegates \
by naming the specialist.
- The specialist resolves every keyword it is handed and reports the results back.
- Once every keyword has a result, the coordinator must output ONE JSON object \
with \"{{ result_key }}\" as its single key and a list of per-keyword results as \
the value, for example:
  {{ example_output }}
- The coordinator must end its final message with \"{{ sentinel }}\" on its own line.
";

fn render_instruction(
    intent: IntentKind,
    keywords: &[String],
    profile: &IntentProfile,
) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("intent", intent.as_str());
    context.insert("keywords", keywords);
    context.insert("coordinator", profile.coordinator);
    context.insert("coordinator_brief", profile.coordinator_brief);
    context.insert("specialist", profile.specialist);
    context.insert("specialist_brief", profile.specialist_brief);
    context.insert("result_key", profile.result_key);
    context.insert("example_output", profile.example_output);
    context.insert("sentinel", COMPLETION_SENTINEL);

    Tera::one_off(INSTRUCTION_TEMPLATE, &context, false)
}

#[cfg(test)]
mod tests {
    use crate::conversation::Role;
    use crate::intent::IntentKind;

    use super::{Topology, TopologyError, COMPLETION_SENTINEL};

    #[test]
    fn build_rejects_empty_keyword_sets() {
        let error = Topology::build(IntentKind::Open, Vec::new())
            .err()
            .expect("empty keywords must not build");
        assert!(matches!(error, TopologyError::EmptyKeywords { intent: "open" }));
    }

    #[test]
    fn each_intent_maps_to_its_fixed_participant_pair() {
        let cases = [
            (IntentKind::Play, "PlayPlannerAgent", "YouTubeVideoSearcherAgent", "open_webbrowser"),
            (
                IntentKind::Open,
                "OpenPlannerAgent",
                "SuggestionWebsiteUrlSearchAgent",
                "open_webbrowser",
            ),
            (
                IntentKind::Execute,
                "ExecutePlannerAgent",
                "ExecuteProgramsParameterAgent",
                "execute_programs",
            ),
        ];

        for (intent, coordinator, specialist, result_key) in cases {
            let topology = Topology::build(intent, vec!["keyword".to_string()])
                .expect("topology should build");
            assert_eq!(topology.coordinator.name, coordinator);
            assert_eq!(topology.coordinator.role, Role::Coordinator);
            assert_eq!(topology.specialists.len(), 1);
            assert_eq!(topology.specialists[0].name, specialist);
            assert_eq!(topology.specialists[0].role, Role::Specialist);
            assert_eq!(topology.result_key, result_key);
        }
    }

    #[test]
    fn instruction_names_intent_keywords_shape_and_sentinel() {
        let topology = Topology::build(
            IntentKind::Play,
            vec!["bohemian rhapsody".to_string(), "take five".to_string()],
        )
        .expect("topology should build");

        assert!(topology.instruction.contains("\"play\""));
        assert!(topology.instruction.contains("- bohemian rhapsody"));
        assert!(topology.instruction.contains("- take five"));
        assert!(topology.instruction.contains("open_webbrowser"));
        assert!(topology.instruction.contains(COMPLETION_SENTINEL));
        assert!(topology.instruction.contains("YouTubeVideoSearcherAgent"));
    }

    #[test]
    fn instruction_is_a_pure_function_of_intent_and_keywords() {
        let keywords = vec!["calculator".to_string()];
        let first = Topology::build(IntentKind::Execute, keywords.clone())
            .expect("topology should build");
        let second =
            Topology::build(IntentKind::Execute, keywords).expect("topology should build");

        assert_eq!(first.instruction, second.instruction);
    }

    #[test]
    fn participants_iterate_coordinator_first() {
        let topology = Topology::build(IntentKind::Open, vec!["news".to_string()])
            .expect("topology should build");
        let names: Vec<&str> =
            topology.participants().map(|participant| participant.name.as_str()).collect();
        assert_eq!(names, vec!["OpenPlannerAgent", "SuggestionWebsiteUrlSearchAgent"]);
    }
}
