//! Stream Gateway configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL may
//! embed credentials and is redacted in Debug output.

use crate::delivery::DEFAULT_OUTBOUND_BUFFER;

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default bus channel published to by the meeting backend.
pub const DEFAULT_REDIS_CHANNEL: &str = "from-akka-apps-redis-channel";

/// Default health and metrics endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default gateway instance ID prefix.
pub const DEFAULT_GW_ID_PREFIX: &str = "gw";

/// Stream Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Redis connection URL for the event bus.
    pub redis_url: SecretString,

    /// Pub/sub channel carrying bus records.
    pub redis_channel: String,

    /// Health endpoint bind address (default: "0.0.0.0:8090").
    pub health_bind_address: String,

    /// Frames each connection may have queued before non-blocking sends
    /// start dropping.
    pub outbound_buffer: usize,

    /// Unique identifier for this gateway instance (log correlation).
    pub gw_id: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("redis_channel", &self.redis_channel)
            .field("health_bind_address", &self.health_bind_address)
            .field("outbound_buffer", &self.outbound_buffer)
            .field("gw_id", &self.gw_id)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `REDIS_URL` is unset, and
    /// `ConfigError::InvalidValue` if a numeric or boolean variable does not
    /// parse or `GW_OUTBOUND_BUFFER` is zero.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?
                .clone(),
        );

        let redis_channel = vars
            .get("GW_REDIS_CHANNEL")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIS_CHANNEL.to_string());

        let health_bind_address = vars
            .get("GW_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let outbound_buffer = match vars.get("GW_OUTBOUND_BUFFER") {
            None => DEFAULT_OUTBOUND_BUFFER,
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue(
                        "GW_OUTBOUND_BUFFER must be greater than zero".to_string(),
                    ))
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::InvalidValue(format!(
                        "GW_OUTBOUND_BUFFER must be a positive integer, got '{raw}': {e}"
                    )))
                }
            },
        };

        let log_json = match vars.get("GW_LOG_JSON").map(|s| s.to_ascii_lowercase()) {
            None => false,
            Some(value) => match value.as_str() {
                "true" | "1" => true,
                "false" | "0" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "GW_LOG_JSON must be true or false, got '{value}'"
                    )))
                }
            },
        };

        let gw_id = vars.get("GW_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_GW_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            redis_url,
            redis_channel,
            health_bind_address,
            outbound_buffer,
            gw_id,
            log_json,
        })
    }
}
