//! Configuration loading and types for the gateway.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every field has a default, so a partial (or even
//! empty) file is valid.  After the file is parsed, environment variables
//! with the fixed `OBSTORE_` prefix override individual values, e.g.
//! `OBSTORE_SERVER_PORT=9090`.

use serde::Deserialize;
use std::path::Path;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "OBSTORE_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Graceful shutdown grace period in seconds. In-flight requests that
    /// outlive it force process termination.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Maximum object size in bytes for a single PUT. Larger bodies are
    /// rejected before being fully buffered.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            max_object_size: default_max_object_size(),
        }
    }
}

/// Backend discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Per-candidate deadline in seconds, bounding container inspection and
    /// bucket preparation calls.
    #[serde(default = "default_search_timeout")]
    pub search_timeout: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_timeout: default_search_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    60
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_object_size() -> u64 {
    5_368_709_120 // 5 GiB
}

fn default_search_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load configuration from a YAML file at `path`, then apply `OBSTORE_*`
/// environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let mut config: Config = serde_yaml::from_str(&contents)?;
    apply_overrides(&mut config, |key| {
        std::env::var(format!("{ENV_PREFIX}{key}")).ok()
    });
    Ok(config)
}

/// Apply environment overrides through an injectable lookup.
///
/// `lookup` receives the key without the prefix (e.g. `SERVER_PORT`).
/// Unparseable numeric values are ignored and the file/default value kept.
fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SERVER_HOST") {
        config.server.host = v;
    }
    if let Some(v) = lookup("SERVER_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = v;
    }
    if let Some(v) = lookup("SERVER_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.server.timeout = v;
    }
    if let Some(v) = lookup("SERVER_SHUTDOWN_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.server.shutdown_timeout = v;
    }
    if let Some(v) = lookup("SERVER_MAX_OBJECT_SIZE").and_then(|v| v.parse().ok()) {
        config.server.max_object_size = v;
    }
    if let Some(v) = lookup("DISCOVERY_SEARCH_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.discovery.search_timeout = v;
    }
    if let Some(v) = lookup("LOGGING_LEVEL") {
        config.logging.level = v;
    }
    if let Some(v) = lookup("LOGGING_FORMAT") {
        config.logging.format = v;
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout, 60);
        assert_eq!(config.server.shutdown_timeout, 30);
        assert_eq!(config.server.max_object_size, 5_368_709_120);
        assert_eq!(config.discovery.search_timeout, 10);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let yaml = "server:\n  port: 9090\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.discovery.search_timeout, 10);
    }

    #[test]
    fn test_full_file() {
        let yaml = r#"
server:
  host: 127.0.0.1
  port: 3000
  timeout: 5
  shutdown_timeout: 2
  max_object_size: 1048576
discovery:
  search_timeout: 3
logging:
  level: debug
  format: json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.timeout, 5);
        assert_eq!(config.server.shutdown_timeout, 2);
        assert_eq!(config.server.max_object_size, 1_048_576);
        assert_eq!(config.discovery.search_timeout, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [
            ("SERVER_HOST", "10.0.0.1"),
            ("SERVER_PORT", "1234"),
            ("SERVER_MAX_OBJECT_SIZE", "2048"),
            ("DISCOVERY_SEARCH_TIMEOUT", "7"),
            ("LOGGING_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        apply_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.server.max_object_size, 2048);
        assert_eq!(config.discovery.search_timeout, 7);
        assert_eq!(config.logging.level, "trace");
        // Untouched keys keep their defaults.
        assert_eq!(config.server.timeout, 60);
    }

    #[test]
    fn test_env_override_bad_number_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, |key| {
            (key == "SERVER_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 4321").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 4321);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/obstore.yaml").is_err());
    }
}
