use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transport metadata stamped onto a ping when it is assembled.
///
/// Captured once so that a configuration change after assembly never
/// alters how an already-queued ping is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMetadata {
    pub server_endpoint: String,
    /// Submission path, e.g. `/submit/<app>/<doc type>/1/<uuid>`.
    pub path: String,
    pub user_agent: String,
    pub channel: Option<String>,
    pub ping_tag: Option<String>,
}

impl PingMetadata {
    pub fn url(&self) -> String {
        format!("{}{}", self.server_endpoint.trim_end_matches('/'), self.path)
    }
}

/// An assembled ping awaiting upload.
///
/// The payload never changes after assembly. The only mutable state is the
/// attempt count, which the pending queue bumps on recoverable failures.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPing {
    id: Uuid,
    document_type: String,
    payload: Bytes,
    created_at: DateTime<Utc>,
    attempt_count: u32,
    metadata: PingMetadata,
    sequence: u64,
}

impl PendingPing {
    pub fn new(
        id: Uuid,
        document_type: impl Into<String>,
        payload: Bytes,
        created_at: DateTime<Utc>,
        metadata: PingMetadata,
    ) -> Self {
        Self {
            id,
            document_type: document_type.into(),
            payload,
            created_at,
            attempt_count: 0,
            metadata,
            sequence: 0,
        }
    }

    pub(crate) fn restore(
        id: Uuid,
        document_type: String,
        payload: Bytes,
        created_at: DateTime<Utc>,
        attempt_count: u32,
        metadata: PingMetadata,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            document_type,
            payload,
            created_at,
            attempt_count,
            metadata,
            sequence,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn metadata(&self) -> &PingMetadata {
        &self.metadata
    }

    /// Position assigned by the pending queue at enqueue time.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub(crate) fn increment_attempts(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }
}
