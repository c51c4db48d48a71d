//! Decoding of serialized tag and metadata payloads
//!
//! Callers hand the bridge flat JSON objects as text. Each payload is decoded
//! on its own into a string-to-string mapping.

use crate::error::{BridgeError, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Which payload is being decoded, used to label errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Tags,
    Metadata,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadKind::Tags => write!(f, "tags"),
            PayloadKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// Decode a serialized flat object into a string mapping
///
/// Entries whose value is not a string are dropped with a warning.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] when the text is not JSON or does not
/// encode an object.
pub fn decode_payload(kind: PayloadKind, text: &str) -> Result<HashMap<String, String>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| BridgeError::decode(kind.to_string(), e.to_string()))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(BridgeError::decode(
                kind.to_string(),
                format!("expected an object, found {}", json_type_name(&other)),
            ))
        }
    };

    let mut mapping = HashMap::with_capacity(object.len());
    for (key, value) in object {
        match value {
            Value::String(s) => {
                mapping.insert(key, s);
            }
            other => {
                log::warn!(
                    "Dropping {} entry '{}': expected a string, found {}",
                    kind,
                    key,
                    json_type_name(&other)
                );
            }
        }
    }

    Ok(mapping)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
