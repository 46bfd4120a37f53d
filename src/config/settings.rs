use super::serde_helpers::{
    load_env_millis, load_env_path, load_env_string, load_env_string_opt, load_env_var,
};
use super::{
    ConfigError, DEFAULT_MAX_EVENTS, DEFAULT_MAX_PENDING_BYTES, DEFAULT_MAX_PENDING_PINGS,
    DEFAULT_MAX_PING_SIZE, DEFAULT_MAX_UPLOAD_ATTEMPTS, DEFAULT_TELEMETRY_ENDPOINT,
    DEFAULT_UPLOAD_INTERVAL, DEFAULT_UPLOAD_TIMEOUT,
};
use crate::queue::QueueConfig;
use crate::upload::{BackoffConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File and environment backed settings.
///
/// `client` mirrors the [`Configuration`](super::Configuration) record minus
/// the uploader; `lifecycle` carries the queue and scheduler tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client: ClientSettings,
    pub lifecycle: LifecycleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub application_id: String,
    pub server_endpoint: String,
    /// Computed from the SDK version when unset.
    pub user_agent: Option<String>,
    pub channel: Option<String>,
    pub max_events: usize,
    pub log_pings: bool,
    pub ping_tag: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            server_endpoint: DEFAULT_TELEMETRY_ENDPOINT.to_string(),
            user_agent: None,
            channel: None,
            max_events: DEFAULT_MAX_EVENTS,
            log_pings: false,
            ping_tag: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub storage_path: PathBuf,
    pub max_ping_size: usize,
    pub max_upload_attempts: u32,
    #[serde(with = "super::serde_helpers")]
    pub upload_timeout: Duration,
    #[serde(with = "super::serde_helpers")]
    pub upload_interval: Duration,
    pub compress_uploads: bool,
    pub max_pending_pings: usize,
    pub max_pending_bytes: u64,
    pub backoff: BackoffConfig,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("/tmp/ping-lifecycle/pending_pings"),
            max_ping_size: DEFAULT_MAX_PING_SIZE,
            max_upload_attempts: DEFAULT_MAX_UPLOAD_ATTEMPTS,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
            compress_uploads: true,
            max_pending_pings: DEFAULT_MAX_PENDING_PINGS,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
            backoff: BackoffConfig::default(),
        }
    }
}

impl LifecycleSettings {
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_attempts: self.max_upload_attempts,
            max_pending_pings: self.max_pending_pings,
            max_pending_bytes: self.max_pending_bytes,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            upload_timeout: self.upload_timeout,
            upload_interval: self.upload_interval,
            compress_uploads: self.compress_uploads,
            backoff: self.backoff.clone(),
        }
    }
}

impl Settings {
    /// Loads settings from an optional TOML file, then applies environment
    /// overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::parse_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Self::parse_file(path.as_ref())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let client = &mut self.client;
        load_env_string("PING_APPLICATION_ID", &mut client.application_id);
        load_env_string("PING_SERVER_ENDPOINT", &mut client.server_endpoint);
        load_env_string_opt("PING_USER_AGENT", &mut client.user_agent);
        load_env_string_opt("PING_CHANNEL", &mut client.channel);
        load_env_var("PING_MAX_EVENTS", &mut client.max_events)?;
        load_env_var("PING_LOG_PINGS", &mut client.log_pings)?;
        load_env_string_opt("PING_DEBUG_VIEW_TAG", &mut client.ping_tag);

        let lifecycle = &mut self.lifecycle;
        load_env_path("PING_STORAGE_PATH", &mut lifecycle.storage_path);
        load_env_var("PING_MAX_PING_SIZE", &mut lifecycle.max_ping_size)?;
        load_env_var("PING_MAX_UPLOAD_ATTEMPTS", &mut lifecycle.max_upload_attempts)?;
        load_env_millis("PING_UPLOAD_TIMEOUT_MS", &mut lifecycle.upload_timeout)?;
        load_env_millis("PING_UPLOAD_INTERVAL_MS", &mut lifecycle.upload_interval)?;
        load_env_var("PING_COMPRESS_UPLOADS", &mut lifecycle.compress_uploads)?;

        Ok(())
    }
}
