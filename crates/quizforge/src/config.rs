//! Server configuration.
//!
//! Every knob has a default, so an empty file is a valid configuration.
//! Durations are whole seconds and their keys end in `_secs`:
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//! jwt_secret = "change-me"
//! pong_wait_secs = 120
//! ping_period_secs = 108
//!
//! [timings]
//! choose = 10
//! answer = 20
//! ```

use std::path::Path;
use std::time::Duration;

use quizforge_engine::Timings;
use quizforge_hub::HubConfig;
use quizforge_transport::TransportConfig;
use serde::{Deserialize, Serialize};

use crate::adapter::AdapterConfig;

/// Largest `max_players` a session may be created with.
pub const MAX_PLAYERS_LIMIT: u32 = 8;

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but don't make sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the server needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// HS256 secret shared with the token issuer.
    pub jwt_secret: String,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Time a client has to finish the upgrade and send its connect frame.
    pub handshake_timeout_secs: u64,

    /// Largest inbound frame, in bytes.
    pub max_message_size: usize,

    /// Frames queued per connection before it counts as a slow consumer.
    pub outbound_capacity: usize,

    /// A connection silent for this long is dropped.
    pub pong_wait_secs: u64,

    /// How often the server pings. Must be shorter than `pong_wait_secs`.
    pub ping_period_secs: u64,

    /// Bound on a single socket write.
    pub write_wait_secs: u64,

    pub command_capacity: usize,
    pub action_capacity: usize,

    /// How long a session may sit with no connections before it closes.
    pub empty_grace_secs: u64,

    pub timings: Timings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            jwt_secret: String::new(),
            log_level: "info".to_string(),
            handshake_timeout_secs: 10,
            max_message_size: quizforge_transport::DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: 256,
            pong_wait_secs: 120,
            ping_period_secs: 108,
            write_wait_secs: 10,
            command_capacity: hub.command_capacity,
            action_capacity: hub.action_capacity,
            empty_grace_secs: hub.empty_grace.as_secs(),
            timings: Timings::default(),
        }
    }
}

impl ServerConfig {
    /// Parses and checks a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and checks a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file without checking it, for callers that
    /// layer overrides on top and call [`validate`](Self::validate) after.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "jwt_secret must be set; an empty key accepts forged credentials".to_string(),
            ));
        }
        if self.ping_period_secs >= self.pong_wait_secs {
            return Err(ConfigError::Invalid(format!(
                "ping_period_secs ({}) must be below pong_wait_secs ({})",
                self.ping_period_secs, self.pong_wait_secs
            )));
        }
        if self.outbound_capacity == 0 || self.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "outbound_capacity and max_message_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            max_message_size: self.max_message_size,
        }
    }

    pub fn adapter(&self) -> AdapterConfig {
        AdapterConfig {
            outbound_capacity: self.outbound_capacity,
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            ping_period: Duration::from_secs(self.ping_period_secs),
            write_wait: Duration::from_secs(self.write_wait_secs),
        }
    }

    pub fn hub(&self) -> HubConfig {
        HubConfig {
            command_capacity: self.command_capacity,
            action_capacity: self.action_capacity,
            empty_grace: Duration::from_secs(self.empty_grace_secs),
        }
    }
}
