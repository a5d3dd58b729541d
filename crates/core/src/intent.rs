use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Intent labels the classifier is allowed to emit. Anything else is dropped
/// during normalization, never constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Play,
    Open,
    Execute,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Open => "open",
            Self::Execute => "execute",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "play" => Some(Self::Play),
            "open" => Some(Self::Open),
            "execute" => Some(Self::Execute),
            _ => None,
        }
    }
}

/// One record as it arrives from the classifier. The keyword field may be a
/// sequence, a bare scalar, or missing entirely.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawIntentRecord {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub keywords: Value,
}

/// A normalized intent: supported label, non-empty deduplicated keywords.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentRequest {
    pub intent: IntentKind,
    pub keywords: Vec<String>,
}

/// Merges raw classifier records into one request per distinct intent.
///
/// Records sharing an intent are grouped in first-seen order; their keywords
/// are concatenated in encounter order and deduplicated by exact string
/// equality, keeping the first occurrence. Records with an unsupported intent
/// or no usable keywords contribute nothing.
pub fn normalize_intents(records: &[RawIntentRecord]) -> Vec<IntentRequest> {
    let mut requests: Vec<IntentRequest> = Vec::new();

    for record in records {
        let Some(intent) = record.intent.as_deref().and_then(IntentKind::from_label) else {
            continue;
        };
        let keywords = coerce_keywords(&record.keywords);
        if keywords.is_empty() {
            continue;
        }

        match requests.iter_mut().find(|request| request.intent == intent) {
            Some(existing) => existing.keywords.extend(keywords),
            None => requests.push(IntentRequest { intent, keywords }),
        }
    }

    for request in &mut requests {
        dedupe_preserving_order(&mut request.keywords);
    }

    requests
}

fn coerce_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_keyword).collect(),
        scalar => scalar_keyword(scalar).into_iter().collect(),
    }
}

fn scalar_keyword(value: &Value) -> Option<String> {
    let keyword = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!keyword.is_empty()).then_some(keyword)
}

fn dedupe_preserving_order(keywords: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    keywords.retain(|keyword| seen.insert(keyword.clone()));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize_intents, IntentKind, RawIntentRecord};

    fn record(intent: &str, keywords: serde_json::Value) -> RawIntentRecord {
        RawIntentRecord { intent: Some(intent.to_string()), keywords }
    }

    #[test]
    fn deduplicates_keywords_preserving_first_occurrence() {
        let records = vec![record("play", json!(["song A", "song A", "song B"]))];

        let requests = normalize_intents(&records);

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].intent, IntentKind::Play);
        assert_eq!(requests[0].keywords, vec!["song A", "song B"]);
    }

    #[test]
    fn merges_records_sharing_an_intent_in_first_seen_order() {
        let records = vec![
            record("open", json!(["weather"])),
            record("play", json!(["jazz"])),
            record("open", json!(["news", "weather"])),
        ];

        let requests = normalize_intents(&records);

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].intent, IntentKind::Open);
        assert_eq!(requests[0].keywords, vec!["weather", "news"]);
        assert_eq!(requests[1].intent, IntentKind::Play);
        assert_eq!(requests[1].keywords, vec!["jazz"]);
    }

    #[test]
    fn coerces_scalar_keywords_into_single_element_lists() {
        let records = vec![record("execute", json!("notepad")), record("play", json!(42))];

        let requests = normalize_intents(&records);

        assert_eq!(requests[0].keywords, vec!["notepad"]);
        assert_eq!(requests[1].keywords, vec!["42"]);
    }

    #[test]
    fn drops_unsupported_intents_silently() {
        let records = vec![
            record("translate", json!(["hello"])),
            RawIntentRecord { intent: None, keywords: json!(["orphan"]) },
            record("play", json!(["song"])),
        ];

        let requests = normalize_intents(&records);

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].intent, IntentKind::Play);
    }

    #[test]
    fn records_without_usable_keywords_contribute_nothing() {
        let records = vec![
            record("play", json!(null)),
            record("open", json!([])),
            record("execute", json!("")),
            record("open", json!([null, ""])),
        ];

        assert!(normalize_intents(&records).is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let records = vec![
            record("play", json!(["b", "a", "b"])),
            record("execute", json!(["x"])),
            record("play", json!(["c", "a"])),
        ];

        let first_pass = normalize_intents(&records);
        let round_tripped: Vec<RawIntentRecord> = first_pass
            .iter()
            .map(|request| record(request.intent.as_str(), serde_json::json!(request.keywords)))
            .collect();
        let second_pass = normalize_intents(&round_tripped);

        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn intent_labels_are_case_insensitive() {
        let records = vec![record("PLAY", json!(["song"]))];

        let requests = normalize_intents(&records);

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].intent, IntentKind::Play);
    }
}
