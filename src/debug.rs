//! Debug view support: payload tracing and the debug-view tag header.

use crate::config::Configuration;
use crate::domain::PendingPing;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Header carrying the debug-view tag.
pub const DEBUG_TAG_HEADER: &str = "X-Debug-ID";

/// Tracing target used for `log_pings` payload traces.
pub const PING_LOG_TARGET: &str = "ping_lifecycle::pings";

const MAX_TAG_LENGTH: usize = 20;

static TAG_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+$"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebugError {
    #[error("tag must not be empty")]
    Empty,
    #[error("tag is {0} characters, limit is {MAX_TAG_LENGTH}")]
    TooLong(usize),
    #[error("tag '{0}' contains characters outside [A-Za-z0-9-]")]
    InvalidCharacters(String),
    #[error("tag pattern failed to compile: {0}")]
    Pattern(String),
}

/// A validated debug-view tag, safe to place in an HTTP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingTag(String);

impl PingTag {
    pub fn parse(tag: &str) -> Result<Self, DebugError> {
        if tag.is_empty() {
            return Err(DebugError::Empty);
        }

        let length = tag.chars().count();
        if length > MAX_TAG_LENGTH {
            return Err(DebugError::TooLong(length));
        }

        let pattern = TAG_PATTERN
            .as_ref()
            .map_err(|e| DebugError::Pattern(e.to_string()))?;
        if !pattern.is_match(tag) {
            return Err(DebugError::InvalidCharacters(tag.to_string()));
        }

        Ok(Self(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PingTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only view over the debug options of a [`Configuration`].
#[derive(Debug, Clone, Copy)]
pub struct DebugController<'a> {
    log_pings: bool,
    ping_tag: Option<&'a PingTag>,
}

impl<'a> DebugController<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self {
            log_pings: config.log_pings(),
            ping_tag: config.ping_tag(),
        }
    }

    pub fn log_pings(&self) -> bool {
        self.log_pings
    }

    /// Tag to attach to an upload. A tag stamped at assembly takes precedence
    /// over the one currently configured.
    pub fn tag_for<'p>(&self, ping: &'p PendingPing) -> Option<&'p str>
    where
        'a: 'p,
    {
        ping.metadata()
            .ping_tag
            .as_deref()
            .or(self.ping_tag.map(PingTag::as_str))
    }

    /// Emits the payload of `ping` when `log_pings` is enabled.
    pub fn trace_payload(&self, ping: &PendingPing) {
        if !self.log_pings {
            return;
        }

        let payload = String::from_utf8_lossy(ping.payload());
        tracing::info!(
            target: PING_LOG_TARGET,
            ping_id = %ping.id(),
            document_type = ping.document_type(),
            attempt = ping.attempt_count() + 1,
            "{payload}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_header_safe_tags() {
        assert_eq!(PingTag::parse("my-debug-tag").unwrap().as_str(), "my-debug-tag");
        assert!(PingTag::parse("ABC123").is_ok());
        assert!(PingTag::parse("a").is_ok());
        assert!(PingTag::parse(&"x".repeat(20)).is_ok());
    }

    #[test]
    fn test_rejects_empty_tag() {
        assert_eq!(PingTag::parse(""), Err(DebugError::Empty));
    }

    #[test]
    fn test_rejects_long_tag() {
        assert_eq!(PingTag::parse(&"x".repeat(21)), Err(DebugError::TooLong(21)));
    }

    #[test]
    fn test_rejects_unsafe_characters() {
        for tag in ["with space", "new\nline", "colon:tag", "ünïcode", "under_score"] {
            assert!(
                matches!(PingTag::parse(tag), Err(DebugError::InvalidCharacters(_))),
                "{tag:?} should be rejected"
            );
        }
    }
}
