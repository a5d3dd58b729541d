use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::conversation::Message;
use crate::topology::COMPLETION_SENTINEL;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no message carried both the completion sentinel and a structured payload")]
    NoCompletedPayload,
    #[error("final payload was not parseable JSON: {0}")]
    MalformedPayload(String),
    #[error("final payload had an unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// A finished conversation's result: one result-type key mapping to the
/// ordered per-keyword values. Serializes as that one-key JSON object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionPayload {
    pub result_key: String,
    pub values: Vec<String>,
}

impl Serialize for ActionPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.result_key, &self.values)?;
        map.end()
    }
}

/// Scans a finished transcript in reverse turn order for the most recent
/// message containing both the completion sentinel and a `{`..`}` span, and
/// parses that span exactly once. A malformed final payload is terminal for
/// this conversation; older messages are never consulted as a fallback.
pub fn extract_final_payload(history: &[Message]) -> Result<ActionPayload, ExtractionError> {
    let candidate = history.iter().rev().find(|message| {
        message.text.contains(COMPLETION_SENTINEL)
            && message.text.contains('{')
            && message.text.contains('}')
    });
    let Some(message) = candidate else {
        return Err(ExtractionError::NoCompletedPayload);
    };

    let span = payload_span(&message.text)?;
    let value: Value = serde_json::from_str(span)
        .map_err(|error| ExtractionError::MalformedPayload(error.to_string()))?;

    payload_from_value(value)
}

fn payload_span(text: &str) -> Result<&str, ExtractionError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ExtractionError::NoCompletedPayload);
    };
    if end < start {
        return Err(ExtractionError::MalformedPayload(
            "closing brace precedes opening brace".to_string(),
        ));
    }
    Ok(&text[start..=end])
}

fn payload_from_value(value: Value) -> Result<ActionPayload, ExtractionError> {
    let Value::Object(map) = value else {
        return Err(ExtractionError::UnexpectedShape("payload is not a JSON object".to_string()));
    };
    if map.len() != 1 {
        return Err(ExtractionError::UnexpectedShape(format!(
            "expected exactly one result key, found {}",
            map.len()
        )));
    }

    let Some((result_key, entries)) = map.into_iter().next() else {
        return Err(ExtractionError::UnexpectedShape("payload object is empty".to_string()));
    };
    let Value::Array(items) = entries else {
        return Err(ExtractionError::UnexpectedShape(format!(
            "`{result_key}` does not map to a list"
        )));
    };

    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(text) => values.push(text),
            other => {
                return Err(ExtractionError::UnexpectedShape(format!(
                    "non-string entry in `{result_key}`: {other}"
                )))
            }
        }
    }

    Ok(ActionPayload { result_key, values })
}
