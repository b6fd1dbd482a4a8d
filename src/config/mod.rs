//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::rate_limit::{ACTION_RATE_LIMIT, LOBBY_RATE_LIMIT};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one event per line
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::Invalid("LOG_FORMAT")),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,

    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,

    /// Move/shoot messages accepted per second per connection
    pub action_rate_limit: u32,
    /// Challenge/match requests accepted per second per connection
    pub lobby_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: match env::var("LOG_FORMAT") {
                Ok(raw) => raw.parse()?,
                Err(_) => LogFormat::Pretty,
            },

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            action_rate_limit: parse_var("ACTION_RATE_LIMIT", ACTION_RATE_LIMIT)?,
            lobby_rate_limit: parse_var("LOBBY_RATE_LIMIT", LOBBY_RATE_LIMIT)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            client_origin: "*".to_string(),
            action_rate_limit: ACTION_RATE_LIMIT,
            lobby_rate_limit: LOBBY_RATE_LIMIT,
        }
    }
}

fn parse_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::Invalid(name)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn default_config_uses_builtin_limits() {
        let config = Config::default();
        assert_eq!(config.action_rate_limit, ACTION_RATE_LIMIT);
        assert_eq!(config.lobby_rate_limit, LOBBY_RATE_LIMIT);
        assert_eq!(config.client_origin, "*");
    }
}
