//! Cache Record Module
//!
//! Defines the stored record, its TTL check, and the validating codec
//! between records and the store's string values.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

// == Cache Record ==
/// A single cached value with its lifetime and grouping metadata.
///
/// Serializes to the storage wire format:
/// `{"data": .., "timestamp": ms, "ttl": secs, "tags": [..], "lastAccessed": ms}`.
///
/// Decoding stays inside the crate; callers only ever see a miss:
///
/// ```compile_fail
/// let _ = kv_cache::cache::CacheRecord::decode("not json");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRecord {
    /// The caller's data
    pub data: Value,
    /// Creation timestamp (Unix milliseconds)
    #[serde(rename = "timestamp")]
    pub created_at: u64,
    /// Lifetime in seconds, always > 0
    #[serde(rename = "ttl")]
    pub ttl_seconds: u64,
    /// Group labels for tag invalidation
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Last successful read (Unix milliseconds), drives LRU eviction
    #[serde(rename = "lastAccessed")]
    pub last_accessed_at: u64,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a record written at `now`. Recency starts at creation time.
    pub fn new(data: Value, ttl_seconds: u64, tags: BTreeSet<String>, now: u64) -> Self {
        Self {
            data,
            created_at: now,
            ttl_seconds,
            tags,
            last_accessed_at: now,
        }
    }

    // == Expires At ==
    /// Expiration timestamp (Unix milliseconds).
    pub fn expires_at(&self) -> u64 {
        self.created_at
            .saturating_add(self.ttl_seconds.saturating_mul(1000))
    }

    // == Is Valid ==
    /// A record is valid strictly before its expiration instant.
    pub fn is_valid(&self, now: u64) -> bool {
        now < self.expires_at()
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expires_at().saturating_sub(now)
    }

    /// Remaining lifetime in whole seconds, 0 once expired.
    pub fn ttl_remaining(&self, now: u64) -> u64 {
        self.ttl_remaining_ms(now) / 1000
    }

    /// Whether the record carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    // == Encode ==
    /// Renders the record in the store's string format.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    // == Decode ==
    /// Parses and validates a stored value.
    ///
    /// `data`, `timestamp` and a positive `ttl` are required. A missing
    /// `lastAccessed` falls back to `timestamp`; missing `tags` means none.
    pub(crate) fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw).map_err(DecodeError::Malformed)?;
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let data = fields
            .remove("data")
            .ok_or(DecodeError::MissingField("data"))?;
        let created_at = required_u64(&fields, "timestamp")?;
        let ttl_seconds = required_u64(&fields, "ttl")?;
        if ttl_seconds == 0 {
            return Err(DecodeError::InvalidField("ttl"));
        }

        let last_accessed_at = match fields.get("lastAccessed") {
            None | Some(Value::Null) => created_at,
            Some(value) => value.as_u64().ok_or(DecodeError::InvalidField("lastAccessed"))?,
        };

        let tags = match fields.get("tags") {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or(DecodeError::InvalidField("tags"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(DecodeError::InvalidField("tags")),
        };

        Ok(Self {
            data,
            created_at,
            ttl_seconds,
            tags,
            last_accessed_at,
        })
    }
}

fn required_u64(fields: &Map<String, Value>, name: &'static str) -> Result<u64, DecodeError> {
    fields
        .get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_u64()
        .ok_or(DecodeError::InvalidField(name))
}

// == Decode Error ==
/// Why a stored value could not be read back as a record.
///
/// Never leaves the crate: every read path turns it into a miss.
#[derive(Error, Debug)]
pub(crate) enum DecodeError {
    #[error("stored value is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("stored value is not a JSON object")]
    NotAnObject,

    #[error("stored record is missing `{0}`")]
    MissingField(&'static str),

    #[error("stored record has an invalid `{0}`")]
    InvalidField(&'static str),
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_record_creation() {
        let record = CacheRecord::new(json!({"name": "Ann"}), 60, BTreeSet::new(), 1_000);

        assert_eq!(record.created_at, 1_000);
        assert_eq!(record.last_accessed_at, 1_000);
        assert_eq!(record.expires_at(), 61_000);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let record = CacheRecord::new(json!(1), 1, BTreeSet::new(), 0);

        assert!(record.is_valid(999));
        // Expired exactly at created_at + ttl
        assert!(!record.is_valid(1_000));
        assert!(!record.is_valid(5_000));
    }

    #[test]
    fn test_ttl_remaining() {
        let record = CacheRecord::new(json!(1), 10, BTreeSet::new(), 0);

        assert_eq!(record.ttl_remaining_ms(500), 9_500);
        assert_eq!(record.ttl_remaining(500), 9);
        assert_eq!(record.ttl_remaining(20_000), 0);
    }

    #[test]
    fn test_encode_wire_format() {
        let record = CacheRecord::new(json!("v"), 30, tags(&["user"]), 42);
        let encoded: Value = serde_json::from_str(&record.encode().unwrap()).unwrap();

        assert_eq!(
            encoded,
            json!({"data": "v", "timestamp": 42, "ttl": 30, "tags": ["user"], "lastAccessed": 42})
        );
    }

    #[test]
    fn test_encode_omits_empty_tags() {
        let record = CacheRecord::new(json!(null), 30, BTreeSet::new(), 42);
        let encoded: Value = serde_json::from_str(&record.encode().unwrap()).unwrap();

        assert!(encoded.get("tags").is_none());
        assert_eq!(encoded["data"], Value::Null);
    }

    #[test]
    fn test_decode_minimal_record() {
        let record = CacheRecord::decode(r#"{"data":[1,2],"timestamp":5,"ttl":3}"#).unwrap();

        assert_eq!(record.data, json!([1, 2]));
        assert_eq!(record.last_accessed_at, 5);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_decode_keeps_null_data() {
        let record = CacheRecord::decode(r#"{"data":null,"timestamp":5,"ttl":3}"#).unwrap();
        assert_eq!(record.data, Value::Null);
    }

    #[test]
    fn test_decode_tags_and_recency() {
        let record = CacheRecord::decode(
            r#"{"data":1,"timestamp":5,"ttl":3,"tags":["b","a"],"lastAccessed":9}"#,
        )
        .unwrap();

        assert!(record.has_tag("a"));
        assert!(record.has_tag("b"));
        assert_eq!(record.last_accessed_at, 9);
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(matches!(
            CacheRecord::decode("definitely not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(CacheRecord::decode("[1,2,3]"), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(matches!(
            CacheRecord::decode(r#"{"timestamp":5,"ttl":3}"#),
            Err(DecodeError::MissingField("data"))
        ));
        assert!(matches!(
            CacheRecord::decode(r#"{"data":1,"ttl":3}"#),
            Err(DecodeError::MissingField("timestamp"))
        ));
        assert!(matches!(
            CacheRecord::decode(r#"{"data":1,"timestamp":5}"#),
            Err(DecodeError::MissingField("ttl"))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_fields() {
        assert!(matches!(
            CacheRecord::decode(r#"{"data":1,"timestamp":"yesterday","ttl":3}"#),
            Err(DecodeError::InvalidField("timestamp"))
        ));
        assert!(matches!(
            CacheRecord::decode(r#"{"data":1,"timestamp":5,"ttl":0}"#),
            Err(DecodeError::InvalidField("ttl"))
        ));
        assert!(matches!(
            CacheRecord::decode(r#"{"data":1,"timestamp":5,"ttl":3,"tags":[1]}"#),
            Err(DecodeError::InvalidField("tags"))
        ));
    }
}
