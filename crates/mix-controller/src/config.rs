//! Mix Controller configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults; the listen port can additionally be overridden by the single
//! positional command-line argument, which is how operators have always run
//! this service.

use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default UDP listen port.
pub const DEFAULT_LISTEN_PORT: u16 = 9559;

/// Default bind host.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default silent interval after which a source is considered gone.
pub const DEFAULT_SOURCE_TIMEOUT_SECONDS: u64 = 5;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "mx";

/// What the shared mix feeds once it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Play the mix on the local audio output.
    Monitor,
    /// Encode the mix and fan it back out to every known peer host.
    Mesh,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Monitor => f.write_str("monitor"),
            OutputMode::Mesh => f.write_str("mesh"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monitor" => Ok(OutputMode::Monitor),
            "mesh" => Ok(OutputMode::Mesh),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown output mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Mix Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind the UDP listener to (default: "0.0.0.0").
    pub bind_host: String,

    /// UDP listen port (default: 9559).
    pub listen_port: u16,

    /// Output mode: monitor or mesh (default: monitor).
    pub mode: OutputMode,

    /// Silent interval after which a source is considered gone (default: 5s).
    pub source_timeout_seconds: u64,

    /// Unique identifier for this instance.
    pub instance_id: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a present variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a present variable fails to parse.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_host = vars
            .get("MX_BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());

        let listen_port = vars
            .get("MX_LISTEN_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LISTEN_PORT);

        let mode = match vars.get("MX_OUTPUT_MODE") {
            Some(raw) => raw.parse()?,
            None => OutputMode::Monitor,
        };

        let source_timeout_seconds = vars
            .get("MX_SOURCE_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECONDS);

        let instance_id = vars.get("MX_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_host,
            listen_port,
            mode,
            source_timeout_seconds,
            instance_id,
        })
    }

    /// Apply the positional listen-port argument, if one was given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the argument is not a valid port number.
    pub fn with_listen_port_arg(mut self, arg: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = arg {
            self.listen_port = raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("listen port argument: {raw}"))
            })?;
        }
        Ok(self)
    }

    /// The socket address string the transport binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.listen_port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("defaults should load");

        assert_eq!(config.bind_host, DEFAULT_BIND_HOST);
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
        assert_eq!(config.mode, OutputMode::Monitor);
        assert_eq!(
            config.source_timeout_seconds,
            DEFAULT_SOURCE_TIMEOUT_SECONDS
        );
        assert!(config.instance_id.starts_with("mx-"));
        assert_eq!(config.listen_addr(), "0.0.0.0:9559");
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("MX_BIND_HOST".to_string(), "127.0.0.1".to_string()),
            ("MX_LISTEN_PORT".to_string(), "5004".to_string()),
            ("MX_OUTPUT_MODE".to_string(), "mesh".to_string()),
            ("MX_SOURCE_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("MX_INSTANCE_ID".to_string(), "mx-lab-001".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("custom values should load");

        assert_eq!(config.bind_host, "127.0.0.1");
        assert_eq!(config.listen_port, 5004);
        assert_eq!(config.mode, OutputMode::Mesh);
        assert_eq!(config.source_timeout_seconds, 2);
        assert_eq!(config.instance_id, "mx-lab-001");
        assert_eq!(config.listen_addr(), "127.0.0.1:5004");
    }

    #[test]
    fn test_invalid_output_mode_rejected() {
        let vars = HashMap::from([("MX_OUTPUT_MODE".to_string(), "broadcast".to_string())]);
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_listen_port_argument_overrides_env() {
        let vars = HashMap::from([("MX_LISTEN_PORT".to_string(), "5004".to_string())]);
        let config = Config::from_vars(&vars)
            .unwrap()
            .with_listen_port_arg(Some("6000"))
            .unwrap();
        assert_eq!(config.listen_port, 6000);

        let config = Config::from_vars(&vars)
            .unwrap()
            .with_listen_port_arg(None)
            .unwrap();
        assert_eq!(config.listen_port, 5004);
    }

    #[test]
    fn test_bad_listen_port_argument_rejected() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let result = config.with_listen_port_arg(Some("not-a-port"));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
