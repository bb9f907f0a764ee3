//! Transactional batch wire format.
//!
//! A commit is one JSON array of operations, applied by the store in array
//! order:
//!
//! ```text
//! [
//!   {"operation":"upsert","request":{"key":"a","value":1,"metadata":{"ttlInSeconds":"30"}}},
//!   {"operation":"delete","request":{"key":"b"}}
//! ]
//! ```

use serde::{Deserialize, Serialize};

use crate::{CodecError, StateValue};

/// One operation of a transactional state batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "request", rename_all = "lowercase")]
pub enum StateOperation {
    Upsert(UpsertRequest),
    Delete(DeleteRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RequestMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub key: String,
}

/// Per-request metadata understood by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Sent as a decimal string; the store rejects numbers here.
    #[serde(rename = "ttlInSeconds", with = "seconds_as_string")]
    pub ttl_in_seconds: u64,
}

impl StateOperation {
    pub fn upsert(key: impl Into<String>, value: &StateValue, ttl_seconds: Option<u64>) -> Self {
        Self::Upsert(UpsertRequest {
            key: key.into(),
            value: value.data.clone(),
            metadata: ttl_seconds.map(|ttl_in_seconds| RequestMetadata { ttl_in_seconds }),
        })
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete(DeleteRequest { key: key.into() })
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Upsert(request) => &request.key,
            Self::Delete(request) => &request.key,
        }
    }

    pub fn ttl_seconds(&self) -> Option<u64> {
        match self {
            Self::Upsert(request) => request.metadata.as_ref().map(|m| m.ttl_in_seconds),
            Self::Delete(_) => None,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }
}

/// Serialize a batch into the request body the store expects.
pub fn encode_batch(operations: &[StateOperation]) -> Result<String, CodecError> {
    serde_json::to_string(operations).map_err(|e| CodecError::MalformedBatch {
        reason: e.to_string(),
    })
}

/// Parse a request body back into operations.
pub fn decode_batch(body: &str) -> Result<Vec<StateOperation>, CodecError> {
    serde_json::from_str(body).map_err(|e| CodecError::MalformedBatch {
        reason: e.to_string(),
    })
}

mod seconds_as_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(seconds: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(seconds)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_wire_shape_with_ttl() {
        let value = StateValue::from_json(serde_json::json!("value1"));
        let batch = vec![
            StateOperation::upsert("key1", &value, Some(2)),
            StateOperation::upsert(
                "key2",
                &StateValue::from_json(serde_json::json!("value2")),
                None,
            ),
        ];

        assert_eq!(
            encode_batch(&batch).unwrap(),
            r#"[{"operation":"upsert","request":{"key":"key1","value":"value1","metadata":{"ttlInSeconds":"2"}}},{"operation":"upsert","request":{"key":"key2","value":"value2"}}]"#
        );
    }

    #[test]
    fn test_delete_wire_shape() {
        let body = encode_batch(&[StateOperation::delete("gone")]).unwrap();
        assert_eq!(body, r#"[{"operation":"delete","request":{"key":"gone"}}]"#);
    }

    #[test]
    fn test_decode_rejects_numeric_ttl() {
        let body = r#"[{"operation":"upsert","request":{"key":"k","value":1,"metadata":{"ttlInSeconds":5}}}]"#;
        assert!(matches!(
            decode_batch(body),
            Err(CodecError::MalformedBatch { .. })
        ));
    }

    #[test]
    fn test_decode_preserves_order_and_ttl() {
        let body = r#"[{"operation":"delete","request":{"key":"b"}},{"operation":"upsert","request":{"key":"a","value":{"n":1},"metadata":{"ttlInSeconds":"30"}}}]"#;
        let ops = decode_batch(body).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].key(), "b");
        assert!(ops[0].is_delete());
        assert_eq!(ops[1].key(), "a");
        assert_eq!(ops[1].ttl_seconds(), Some(30));
    }
}
