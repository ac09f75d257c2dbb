//! Application configuration structs
//!
//! Loads configuration from environment variables (and an optional `.env` file).

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    /// `None` runs the gateway against the in-memory user directory
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub realtime: RealtimeConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
}

/// Realtime delivery tuning
///
/// Queue capacities bound memory per connection and for the router; the
/// timeouts bound how long a stalled peer can hold resources.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Per-session outbound queue capacity
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue_capacity: usize,
    /// Router publish queue capacity
    #[serde(default = "default_publish_queue")]
    pub publish_queue_capacity: usize,
    /// Router register/unregister queue capacity
    #[serde(default = "default_control_queue")]
    pub control_queue_capacity: usize,
    /// Deadline for a single transport write
    #[serde(default = "default_write_wait_ms")]
    pub write_wait_ms: u64,
    /// How long to wait for a pong before giving up on the peer
    #[serde(default = "default_pong_wait_ms")]
    pub pong_wait_ms: u64,
    /// Largest inbound frame accepted
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl RealtimeConfig {
    #[must_use]
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    #[must_use]
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Ping period, nine tenths of the pong wait so a ping always lands first
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        let wait = self.pong_wait_ms;
        Duration::from_millis(wait / 10 * 9 + wait % 10 * 9 / 10)
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_OUTBOUND_QUEUE",
                "must be greater than zero".to_string(),
            ));
        }
        if self.publish_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_PUBLISH_QUEUE",
                "must be greater than zero".to_string(),
            ));
        }
        if self.control_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_CONTROL_QUEUE",
                "must be greater than zero".to_string(),
            ));
        }
        if self.write_wait_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_WRITE_WAIT_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_MAX_FRAME_BYTES",
                "must be greater than zero".to_string(),
            ));
        }
        if self.pong_wait_ms < 10 {
            return Err(ConfigError::InvalidValue(
                "REALTIME_PONG_WAIT_MS",
                format!("{} is too short", self.pong_wait_ms),
            ));
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue(),
            publish_queue_capacity: default_publish_queue(),
            control_queue_capacity: default_control_queue(),
            write_wait_ms: default_write_wait_ms(),
            pong_wait_ms: default_pong_wait_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-gateway".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

fn default_outbound_queue() -> usize {
    256
}

fn default_publish_queue() -> usize {
    256
}

fn default_control_queue() -> usize {
    64
}

fn default_write_wait_ms() -> u64 {
    10_000
}

fn default_pong_wait_ms() -> u64 {
    60_000
}

fn default_max_frame_bytes() -> usize {
    512 * 1024
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from any key/value lookup
    pub fn from_source<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            var: &impl Fn(&str) -> Option<String>,
            key: &'static str,
        ) -> Result<Option<T>, ConfigError> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidValue(key, raw)),
                None => Ok(None),
            }
        }

        let database = match var("DATABASE_URL").filter(|url| !url.is_empty()) {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parsed(&var, "DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: parsed(&var, "DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
            }),
            None => None,
        };

        let realtime = RealtimeConfig {
            outbound_queue_capacity: parsed(&var, "REALTIME_OUTBOUND_QUEUE")?
                .unwrap_or_else(default_outbound_queue),
            publish_queue_capacity: parsed(&var, "REALTIME_PUBLISH_QUEUE")?
                .unwrap_or_else(default_publish_queue),
            control_queue_capacity: parsed(&var, "REALTIME_CONTROL_QUEUE")?
                .unwrap_or_else(default_control_queue),
            write_wait_ms: parsed(&var, "REALTIME_WRITE_WAIT_MS")?
                .unwrap_or_else(default_write_wait_ms),
            pong_wait_ms: parsed(&var, "REALTIME_PONG_WAIT_MS")?
                .unwrap_or_else(default_pong_wait_ms),
            max_frame_bytes: parsed(&var, "REALTIME_MAX_FRAME_BYTES")?
                .unwrap_or_else(default_max_frame_bytes),
        };
        realtime.validate()?;

        Ok(Self {
            app: AppSettings {
                name: var("APP_NAME").unwrap_or_else(default_app_name),
                env: var("APP_ENV")
                    .as_deref()
                    .and_then(Environment::parse)
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: var("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parsed(&var, "GATEWAY_PORT")?.unwrap_or_else(default_port),
            },
            database,
            jwt: JwtConfig {
                secret: var("JWT_SECRET")
                    .filter(|s| !s.is_empty())
                    .ok_or(ConfigError::MissingVar("JWT_SECRET"))?,
                access_token_expiry: parsed(&var, "JWT_ACCESS_TOKEN_EXPIRY")?
                    .unwrap_or_else(default_access_token_expiry),
            },
            realtime,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
