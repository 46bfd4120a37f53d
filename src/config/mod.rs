pub(crate) mod serde_helpers;
pub mod settings;
mod validation;

use crate::debug::{DebugError, PingTag};
use crate::upload::PingUploader;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use serde_helpers::{load_env_path, load_env_string, load_env_string_opt, load_env_var};
pub use settings::{ClientSettings, LifecycleSettings, Settings};

/// The default server pings are sent to.
pub const DEFAULT_TELEMETRY_ENDPOINT: &str = "https://incoming.telemetry.mozilla.org";

/// The default number of events to buffer before force-sending the events ping.
pub const DEFAULT_MAX_EVENTS: usize = 500;

/// Assembled payloads above this size are dropped instead of queued.
pub const DEFAULT_MAX_PING_SIZE: usize = 1024 * 1024; // 1MB

/// Recoverable failures a single ping may accumulate before it is deleted.
pub const DEFAULT_MAX_UPLOAD_ATTEMPTS: u32 = 5;

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Pending directory quota applied when the queue is rehydrated.
pub const DEFAULT_MAX_PENDING_PINGS: usize = 250;
pub const DEFAULT_MAX_PENDING_BYTES: u64 = 10 * 1024 * 1024; // 10MB

/// Name reported in the user agent and the `X-Client-Type` header.
pub const SDK_NAME: &str = "ping-lifecycle";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid ping tag: {0}")]
    InvalidPingTag(#[from] DebugError),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

/// Builds the version-stamped user agent sent with every ping.
pub fn default_user_agent(sdk_version: &str) -> String {
    format!(
        "{SDK_NAME}/{sdk_version} (Rust on {})",
        std::env::consts::OS
    )
}

/// Client configuration. Immutable once built.
///
/// The uploader is a required collaborator supplied by the application; there
/// is no process-wide default transport.
#[derive(Clone)]
pub struct Configuration {
    application_id: String,
    server_endpoint: Url,
    user_agent: String,
    channel: Option<String>,
    max_events: NonZeroUsize,
    log_pings: bool,
    ping_tag: Option<PingTag>,
    uploader: Arc<dyn PingUploader>,
}

impl Configuration {
    pub fn builder(
        application_id: impl Into<String>,
        uploader: Arc<dyn PingUploader>,
    ) -> ConfigurationBuilder {
        ConfigurationBuilder::new(application_id, uploader)
    }

    /// Builds a configuration from file/env settings, computing the default
    /// user agent from `sdk_version` when none is set.
    pub fn from_settings(
        settings: &ClientSettings,
        uploader: Arc<dyn PingUploader>,
        sdk_version: &str,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigurationBuilder::new(settings.application_id.clone(), uploader)
            .server_endpoint(settings.server_endpoint.clone())
            .sdk_version(sdk_version)
            .max_events(settings.max_events)
            .log_pings(settings.log_pings);

        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if let Some(channel) = &settings.channel {
            builder = builder.channel(channel.clone());
        }
        if let Some(tag) = &settings.ping_tag {
            builder = builder.ping_tag(tag.clone());
        }

        builder.build()
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn server_endpoint(&self) -> &Url {
        &self.server_endpoint
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn max_events(&self) -> usize {
        self.max_events.get()
    }

    pub fn log_pings(&self) -> bool {
        self.log_pings
    }

    pub fn ping_tag(&self) -> Option<&PingTag> {
        self.ping_tag.as_ref()
    }

    pub fn uploader(&self) -> &Arc<dyn PingUploader> {
        &self.uploader
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("application_id", &self.application_id)
            .field("server_endpoint", &self.server_endpoint.as_str())
            .field("user_agent", &self.user_agent)
            .field("channel", &self.channel)
            .field("max_events", &self.max_events)
            .field("log_pings", &self.log_pings)
            .field("ping_tag", &self.ping_tag)
            .finish_non_exhaustive()
    }
}

pub struct ConfigurationBuilder {
    application_id: String,
    uploader: Arc<dyn PingUploader>,
    server_endpoint: String,
    user_agent: Option<String>,
    sdk_version: String,
    channel: Option<String>,
    max_events: usize,
    log_pings: bool,
    ping_tag: Option<String>,
}

impl ConfigurationBuilder {
    pub fn new(application_id: impl Into<String>, uploader: Arc<dyn PingUploader>) -> Self {
        Self {
            application_id: application_id.into(),
            uploader,
            server_endpoint: DEFAULT_TELEMETRY_ENDPOINT.to_string(),
            user_agent: None,
            sdk_version: crate::VERSION.to_string(),
            channel: None,
            max_events: DEFAULT_MAX_EVENTS,
            log_pings: false,
            ping_tag: None,
        }
    }

    pub fn server_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.server_endpoint = endpoint.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Version stamped into the default user agent.
    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = version.into();
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn log_pings(mut self, enabled: bool) -> Self {
        self.log_pings = enabled;
        self
    }

    pub fn ping_tag(mut self, tag: impl Into<String>) -> Self {
        self.ping_tag = Some(tag.into());
        self
    }

    pub fn build(self) -> Result<Configuration, ConfigError> {
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Application id must not be empty".to_string(),
            ));
        }

        let server_endpoint = validation::parse_endpoint(&self.server_endpoint)?;

        let max_events = NonZeroUsize::new(self.max_events).ok_or_else(|| {
            ConfigError::InvalidConfig("Max events must be greater than 0".to_string())
        })?;

        let ping_tag = self.ping_tag.as_deref().map(PingTag::parse).transpose()?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| default_user_agent(&self.sdk_version));
        // Sent verbatim as a header value
        if user_agent.is_empty() || user_agent.chars().any(char::is_control) {
            return Err(ConfigError::InvalidConfig(
                "User agent must be non-empty and free of control characters".to_string(),
            ));
        }

        Ok(Configuration {
            application_id: self.application_id,
            server_endpoint,
            user_agent,
            channel: self.channel,
            max_events,
            log_pings: self.log_pings,
            ping_tag,
            uploader: self.uploader,
        })
    }
}
