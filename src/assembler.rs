//! Turns a measurement snapshot into an immutable, queue-ready ping.

use crate::buffer::MeasurementSnapshot;
use crate::config::{Configuration, SDK_NAME};
use crate::domain::{PendingPing, PingMetadata, PingType, RecordedEvent};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Schema version segment of the submission path.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Ping '{0}' has nothing to send")]
    EmptySnapshot(String),
    #[error("Ping '{document_type}' is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        document_type: String,
        size: usize,
        limit: usize,
    },
    #[error("Invalid document type: '{0}'")]
    InvalidDocumentType(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct PingDocument<'a> {
    ping_info: PingInfo<'a>,
    client_info: ClientInfo<'a>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metrics: BTreeMap<&'static str, BTreeMap<&'a str, serde_json::Value>>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    events: &'a [RecordedEvent],
}

#[derive(Serialize)]
struct PingInfo<'a> {
    ping_type: &'a str,
    document_id: String,
    start_time: String,
    end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Serialize)]
struct ClientInfo<'a> {
    application_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_channel: Option<&'a str>,
    telemetry_sdk_build: &'a str,
}

fn is_empty_slice<T>(slice: &&[T]) -> bool {
    slice.is_empty()
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Document types become a path segment, so they are restricted to
/// lowercase ASCII, digits, `-` and `_`.
fn validate_document_type(document_type: &str) -> Result<(), AssemblyError> {
    let valid = !document_type.is_empty()
        && document_type.len() <= 64
        && document_type
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(AssemblyError::InvalidDocumentType(document_type.to_string()))
    }
}

/// Lowercases the application id and replaces anything outside `[a-z0-9]`
/// with `-`, collapsing runs. Leading and trailing dashes are dropped.
pub fn sanitize_application_id(application_id: &str) -> String {
    let mut sanitized = String::with_capacity(application_id.len());
    let mut last_dash = false;

    for c in application_id.trim().chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            sanitized.push('-');
            last_dash = true;
        }
    }

    sanitized.trim_matches('-').to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct PingAssembler {
    max_ping_size: usize,
}

impl Default for PingAssembler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_PING_SIZE)
    }
}

impl PingAssembler {
    pub fn new(max_ping_size: usize) -> Self {
        Self { max_ping_size }
    }

    pub fn max_ping_size(&self) -> usize {
        self.max_ping_size
    }

    pub fn assemble(
        &self,
        document_type: &str,
        snapshot: &MeasurementSnapshot,
        config: &Configuration,
    ) -> Result<PendingPing, AssemblyError> {
        self.assemble_with_reason(document_type, snapshot, config, None)
    }

    /// Assembles a ping, recording why it was submitted in `ping_info.reason`.
    pub fn assemble_with_reason(
        &self,
        document_type: &str,
        snapshot: &MeasurementSnapshot,
        config: &Configuration,
        reason: Option<&str>,
    ) -> Result<PendingPing, AssemblyError> {
        self.build(document_type, snapshot, config, reason, None)
    }

    /// Assembles a ping of a registered type. `client_id` lands in
    /// `client_info` only when the type opts in.
    pub fn assemble_for(
        &self,
        ping_type: &PingType,
        snapshot: &MeasurementSnapshot,
        config: &Configuration,
        reason: Option<&str>,
        client_id: Uuid,
    ) -> Result<PendingPing, AssemblyError> {
        let client_id = ping_type.include_client_id().then_some(client_id);
        self.build(ping_type.name(), snapshot, config, reason, client_id)
    }

    fn build(
        &self,
        document_type: &str,
        snapshot: &MeasurementSnapshot,
        config: &Configuration,
        reason: Option<&str>,
        client_id: Option<Uuid>,
    ) -> Result<PendingPing, AssemblyError> {
        validate_document_type(document_type)?;

        if snapshot.is_empty() {
            return Err(AssemblyError::EmptySnapshot(document_type.to_string()));
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let mut metrics: BTreeMap<&'static str, BTreeMap<&str, serde_json::Value>> =
            BTreeMap::new();
        for (metric_id, value) in &snapshot.metrics {
            metrics
                .entry(value.type_name())
                .or_default()
                .insert(metric_id.as_str(), value.to_json());
        }

        let document = PingDocument {
            ping_info: PingInfo {
                ping_type: document_type,
                document_id: id.to_string(),
                start_time: format_time(snapshot.start_time),
                end_time: format_time(snapshot.end_time),
                reason,
            },
            client_info: ClientInfo {
                application_id: config.application_id(),
                client_id: client_id.map(|id| id.to_string()),
                app_channel: config.channel(),
                telemetry_sdk_build: crate::VERSION,
            },
            metrics,
            events: &snapshot.events,
        };

        let payload = serde_json::to_vec(&document)?;
        if payload.len() > self.max_ping_size {
            return Err(AssemblyError::PayloadTooLarge {
                document_type: document_type.to_string(),
                size: payload.len(),
                limit: self.max_ping_size,
            });
        }

        let metadata = PingMetadata {
            server_endpoint: config.server_endpoint().as_str().to_string(),
            path: format!(
                "/submit/{}/{document_type}/{SCHEMA_VERSION}/{id}",
                sanitize_application_id(config.application_id())
            ),
            user_agent: config.user_agent().to_string(),
            channel: config.channel().map(str::to_string),
            ping_tag: config.ping_tag().map(|tag| tag.as_str().to_string()),
        };

        tracing::debug!(
            "Assembled {SDK_NAME} ping {id} ({document_type}, {} bytes)",
            payload.len()
        );

        Ok(PendingPing::new(
            id,
            document_type,
            Bytes::from(payload),
            created_at,
            metadata,
        ))
    }
}
