//! Collected record types and utilities

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Why a request body was rejected
#[derive(Debug)]
pub enum RecordError {
    /// Body is not valid JSON
    Malformed(serde_json::Error),
    /// Body is valid JSON but not an object
    NotAnObject,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Malformed(e) => write!(f, "malformed JSON: {}", e),
            RecordError::NotAnObject => write!(f, "JSON body must be an object"),
        }
    }
}

impl std::error::Error for RecordError {}

/// A JSON object received from a producer
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedRecord {
    fields: Map<String, Value>,
}

impl CollectedRecord {
    /// Parse a request body. Numbers keep their original text.
    pub fn parse(body: &[u8]) -> Result<Self, RecordError> {
        match serde_json::from_slice::<Value>(body).map_err(RecordError::Malformed)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(RecordError::NotAnObject),
        }
    }

    /// Add the receive time and routing segments, replacing any values the producer sent
    pub fn stamp(&mut self, platform: &str, doc_type: &str, received_at: DateTime<Utc>) {
        self.fields
            .insert("ts".to_string(), Value::from(received_at.timestamp()));
        self.fields
            .insert("doctype".to_string(), Value::from(doc_type));
        self.fields
            .insert("platform".to_string(), Value::from(platform));
    }

    /// Field lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(
            CollectedRecord::parse(b"{broken"),
            Err(RecordError::Malformed(_))
        ));
        assert!(matches!(
            CollectedRecord::parse(b"[1, 2]"),
            Err(RecordError::NotAnObject)
        ));
        assert!(CollectedRecord::parse(br#"{"a": 1}"#).is_ok());
    }

    #[test]
    fn test_stamp_overrides_routing_fields() {
        let mut record =
            CollectedRecord::parse(br#"{"platform":"spoofed","uid":12423434,"msg":"hi\nthere"}"#)
                .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        record.stamp("web", "click", at);

        assert_eq!(record.get("platform"), Some(&Value::from("web")));
        assert_eq!(record.get("doctype"), Some(&Value::from("click")));
        assert_eq!(record.get("ts"), Some(&Value::from(at.timestamp())));

        let json = record.to_json().unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("12423434"));
    }

    #[test]
    fn test_numbers_keep_their_text() {
        let mut record =
            CollectedRecord::parse(br#"{"big":123456789012345678901234567890,"f":1.10,"tail":0.000}"#)
                .unwrap();
        record.stamp("web", "click", Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap());

        let json = record.to_json().unwrap();
        assert!(json.contains(r#""big":123456789012345678901234567890"#));
        assert!(json.contains(r#""f":1.10"#));
        assert!(json.contains(r#""tail":0.000"#));
    }
}
