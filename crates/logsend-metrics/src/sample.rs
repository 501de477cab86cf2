//! Captured samples and schema key helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One captured payload and the time it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Capture time
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// Raw message payload
    pub payload: Value,
}

impl Sample {
    /// Captures `payload` now.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self::at(Utc::now(), payload)
    }

    /// Captures `payload` at a fixed time.
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>, payload: Value) -> Self {
        Self { timestamp, payload }
    }
}

/// Returns the JSON kind name of a value.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Derives a schema key from a payload's shape.
///
/// Objects hash their sorted field names and field kinds, so two payloads
/// with the same fields land in the same stream regardless of values:
/// `object-3f2a9c1b5e7d0a42`. Every other value maps to its kind name.
#[must_use]
pub fn shape_key(value: &Value) -> String {
    let Value::Object(fields) = value else {
        return kind_of(value).to_string();
    };

    let mut shape: Vec<(&str, &str)> = fields
        .iter()
        .map(|(name, field)| (name.as_str(), kind_of(field)))
        .collect();
    shape.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for (name, kind) in shape {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(kind.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize().to_hex();
    format!("object-{}", &digest.as_str()[..16])
}

/// Makes a schema key safe to embed in a file name.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`; an empty key becomes `_`.
#[must_use]
pub fn sanitize_schema(schema: &str) -> String {
    if schema.is_empty() {
        return "_".to_string();
    }
    schema
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
