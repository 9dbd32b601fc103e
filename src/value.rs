use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The value held for a key: either an opaque UTF-8 string or a structured
/// JSON document. The two are kept distinct so a round-tripped object comes
/// back as an object, not a re-escaped string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(String),
    Json(JsonValue),
}

impl Value {
    /// Classifies a parsed JSON value the way the wire format does: only
    /// objects and arrays are kept structured, everything else (numbers,
    /// bools, null, bare strings) is flattened to its JSON text and stored
    /// as bytes to avoid lossy coercion on the way back out.
    pub fn from_parsed_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(_) | JsonValue::Array(_) => Value::Json(value),
            JsonValue::String(s) => Value::Bytes(s),
            other => Value::Bytes(other.to_string()),
        }
    }

    /// Best-effort reclassification used by WAL recovery: the bytes are
    /// always valid UTF-8 (per the WAL invariant); if they parse as JSON and
    /// the result is an object or array, recover the structured form.
    pub fn from_wal_bytes(bytes: &str) -> Self {
        match serde_json::from_str::<JsonValue>(bytes) {
            Ok(v @ JsonValue::Object(_)) | Ok(v @ JsonValue::Array(_)) => Value::Json(v),
            _ => Value::Bytes(bytes.to_string()),
        }
    }

    /// The bytes written to the WAL value field: the UTF-8 string itself,
    /// or the canonical JSON serialization of the structured document.
    pub fn to_wal_bytes(&self) -> Vec<u8> {
        match self {
            Value::Bytes(s) => s.as_bytes().to_vec(),
            Value::Json(v) => serde_json::to_vec(v).expect("serde_json::Value always serializes"),
        }
    }

    pub fn as_json(&self) -> JsonValue {
        match self {
            Value::Bytes(s) => JsonValue::String(s.clone()),
            Value::Json(v) => v.clone(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Bytes(s) => serializer.serialize_str(s),
            Value::Json(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = JsonValue::deserialize(deserializer)?;
        Ok(Value::from_parsed_json(v))
    }
}

/// A stored value plus the wall-clock millisecond timestamp it was applied
/// at. `ts` is advisory only — see the engine's recovery path, which cannot
/// recover the original apply time from the WAL and re-stamps on replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub value: Value,
    pub ts: i64,
}

pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_round_trips_structured() {
        let v = Value::from_parsed_json(serde_json::json!({"a": 1}));
        assert!(matches!(v, Value::Json(_)));
        let bytes = v.to_wal_bytes();
        let back = Value::from_wal_bytes(std::str::from_utf8(&bytes).unwrap());
        assert_eq!(v, back);
    }

    #[test]
    fn bare_string_stays_bytes() {
        let v = Value::from_parsed_json(serde_json::json!("hello"));
        assert_eq!(v, Value::Bytes("hello".to_string()));
    }

    #[test]
    fn plain_string_value_is_not_reparsed_as_json() {
        // A raw (non-JSON) PUT body that happens to look like a number
        // must stay a string, never get coerced into Value::Json.
        let v = Value::from_wal_bytes("42");
        assert_eq!(v, Value::Bytes("42".to_string()));
    }
}
