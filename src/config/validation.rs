use super::{ConfigError, Settings};
use crate::debug::PingTag;
use url::Url;

/// Parses the collector endpoint; it must be an absolute http(s) URL.
pub(super) fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(endpoint).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid endpoint URL '{endpoint}': {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint URL '{endpoint}' must be an absolute http(s) URL"
        )));
    }

    Ok(url)
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_endpoint(&self.client.server_endpoint)?;

        if self.client.max_events == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max events must be greater than 0".to_string(),
            ));
        }

        if let Some(tag) = &self.client.ping_tag {
            PingTag::parse(tag)?;
        }

        let lifecycle = &self.lifecycle;
        if lifecycle.max_ping_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max ping size must be greater than 0".to_string(),
            ));
        }

        if lifecycle.max_upload_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max upload attempts must be greater than 0".to_string(),
            ));
        }

        if lifecycle.upload_timeout.is_zero() || lifecycle.upload_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Upload timeout and interval must be greater than 0".to_string(),
            ));
        }

        if lifecycle.max_pending_pings == 0 {
            return Err(ConfigError::InvalidConfig(
                "Pending ping quota must allow at least one ping".to_string(),
            ));
        }

        if lifecycle.backoff.base_delay > lifecycle.backoff.max_delay {
            return Err(ConfigError::InvalidConfig(format!(
                "Backoff base delay ({:?}) exceeds max delay ({:?})",
                lifecycle.backoff.base_delay, lifecycle.backoff.max_delay
            )));
        }

        if self.client.application_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Application id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
