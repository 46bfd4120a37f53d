//! On-disk encoding of a pending ping.

use crate::domain::{PendingPing, PingMetadata};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const RECORD_VERSION: u8 = 1;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::error::EncodeError),
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] bincode::error::DecodeError),
    #[error("Unsupported record version {0}")]
    UnsupportedVersion(u8),
    #[error("Record id {found} does not match key {expected}")]
    KeyMismatch { expected: String, found: Uuid },
}

#[derive(Serialize, Deserialize)]
struct StoredPing {
    version: u8,
    id: Uuid,
    document_type: String,
    payload: Vec<u8>,
    created_at: DateTime<Utc>,
    attempt_count: u32,
    sequence: u64,
    metadata: PingMetadata,
}

pub(crate) fn storage_key(id: Uuid) -> String {
    id.to_string()
}

/// Pending pings are keyed by their id; anything else in the store belongs
/// to someone else.
pub(crate) fn is_ping_key(key: &str) -> bool {
    Uuid::parse_str(key).is_ok()
}

pub(crate) fn encode(ping: &PendingPing) -> Result<Vec<u8>, RecordError> {
    let stored = StoredPing {
        version: RECORD_VERSION,
        id: ping.id(),
        document_type: ping.document_type().to_string(),
        payload: ping.payload().to_vec(),
        created_at: ping.created_at(),
        attempt_count: ping.attempt_count(),
        sequence: ping.sequence(),
        metadata: ping.metadata().clone(),
    };

    Ok(bincode::serde::encode_to_vec(&stored, bincode::config::standard())?)
}

/// Decodes the record stored under `key`, rejecting records whose embedded id
/// disagrees with the key they were found under.
pub(crate) fn decode(key: &str, data: &[u8]) -> Result<PendingPing, RecordError> {
    let (stored, _): (StoredPing, usize) =
        bincode::serde::decode_from_slice(data, bincode::config::standard())?;

    if stored.version != RECORD_VERSION {
        return Err(RecordError::UnsupportedVersion(stored.version));
    }

    if storage_key(stored.id) != key {
        return Err(RecordError::KeyMismatch {
            expected: key.to_string(),
            found: stored.id,
        });
    }

    Ok(PendingPing::restore(
        stored.id,
        stored.document_type,
        Bytes::from(stored.payload),
        stored.created_at,
        stored.attempt_count,
        stored.metadata,
        stored.sequence,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> PendingPing {
        let mut ping = PendingPing::new(
            Uuid::new_v4(),
            "metrics",
            Bytes::from_static(br#"{"ping_info":{}}"#),
            Utc::now(),
            PingMetadata {
                server_endpoint: "https://example.com/".into(),
                path: "/submit/app/metrics/1/x".into(),
                user_agent: "ua".into(),
                channel: Some("beta".into()),
                ping_tag: None,
            },
        );
        ping.set_sequence(7);
        ping.increment_attempts();
        ping
    }

    #[test]
    fn test_decode_restores_every_field() {
        let original = ping();
        let key = storage_key(original.id());
        let decoded = decode(&key, &encode(&original).unwrap()).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.sequence(), 7);
        assert_eq!(decoded.attempt_count(), 1);
    }

    #[test]
    fn test_decode_rejects_foreign_key() {
        let original = ping();
        let result = decode("some-other-key", &encode(&original).unwrap());
        assert!(matches!(result, Err(RecordError::KeyMismatch { .. })));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode("k", b"\xff\xfe not a record");
        assert!(result.is_err());
    }
}
