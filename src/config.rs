//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! the liveness server, the worker launch defaults, supervisor idle timing,
//! and logging. `AppConfig` is the root configuration struct containing all
//! settings. Every section has a default, so an empty file (or no file at all)
//! yields a usable configuration.

use const_format::formatcp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// =============================================================================
// HTTP Response Cache Control
// =============================================================================

/// Probe responses must never be served from an intermediate cache
pub const CACHE_CONTROL_PROBE: &str = "no-store";

// =============================================================================
// Supervisor Timing Constants
// =============================================================================

/// Idle sleep increment when no heartbeat file is configured (one day)
pub const DEFAULT_IDLE_INTERVAL_SECS: u64 = 86400;

/// Interval between heartbeat rewrites
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Age after which a heartbeat is reported as stale (three missed ticks)
pub const DEFAULT_HEARTBEAT_STALE_SECS: u64 = 90;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = formatcp!("{}=info,tower_http=info", env!("CARGO_CRATE_NAME"));

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Environment variable hosting platforms use to assign the listening port
pub const PORT_ENV_VAR: &str = "PORT";

/// Default bind address for the liveness server
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default port for the liveness server
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default worker entry point
pub const DEFAULT_WORKER_COMMAND: &str = "python3";
pub const DEFAULT_WORKER_SCRIPT: &str = "bot.py";

/// Default sink for the worker's combined output
pub const DEFAULT_WORKER_LOG_FILE: &str = "bot.log";

pub const DEFAULT_SERVICE_NAME: &str = "IG Vault Bot";
pub const DEFAULT_SERVICE_DESCRIPTION: &str =
    "A Telegram bot for Instagram account distribution with referral system";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Liveness server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Identity reported by the root endpoint
    #[serde(default)]
    pub service: ServiceConfig,
    /// How to launch the background worker
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Idle loop and heartbeat timing
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HTTP_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_HTTP_PORT
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_name")]
    pub name: String,
    #[serde(default = "ServiceConfig::default_description")]
    pub description: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            description: Self::default_description(),
        }
    }
}

impl ServiceConfig {
    fn default_name() -> String {
        DEFAULT_SERVICE_NAME.to_string()
    }

    fn default_description() -> String {
        DEFAULT_SERVICE_DESCRIPTION.to_string()
    }
}

/// How the worker log file is opened on each supervisor invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Overwrite the previous invocation's output
    #[default]
    Truncate,
    /// Keep previous output and add to the end
    Append,
}

/// Worker launch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Program to execute (resolved through PATH)
    #[serde(default = "WorkerConfig::default_command")]
    pub command: String,
    #[serde(default = "WorkerConfig::default_args")]
    pub args: Vec<String>,
    /// Working directory for the worker (defaults to the supervisor's)
    pub working_dir: Option<PathBuf>,
    #[serde(default = "WorkerConfig::default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub log_mode: LogMode,
    /// Where the supervisor records the worker's observed state. Disabled when unset.
    pub heartbeat_file: Option<PathBuf>,
    /// Extra environment for the worker, on top of the inherited environment
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            args: Self::default_args(),
            working_dir: None,
            log_file: Self::default_log_file(),
            log_mode: LogMode::default(),
            heartbeat_file: None,
            env: HashMap::new(),
        }
    }
}

impl WorkerConfig {
    fn default_command() -> String {
        DEFAULT_WORKER_COMMAND.to_string()
    }

    fn default_args() -> Vec<String> {
        vec![DEFAULT_WORKER_SCRIPT.to_string()]
    }

    fn default_log_file() -> PathBuf {
        PathBuf::from(DEFAULT_WORKER_LOG_FILE)
    }

    /// Human-readable command line, for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Sleep increment of the idle loop when heartbeats are disabled
    #[serde(default = "SupervisorConfig::default_idle_interval")]
    pub idle_interval_secs: u64,
    #[serde(default = "SupervisorConfig::default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Heartbeats older than this are reported as stale by /health/worker
    #[serde(default = "SupervisorConfig::default_heartbeat_stale")]
    pub heartbeat_stale_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            idle_interval_secs: Self::default_idle_interval(),
            heartbeat_interval_secs: Self::default_heartbeat_interval(),
            heartbeat_stale_secs: Self::default_heartbeat_stale(),
        }
    }
}

impl SupervisorConfig {
    fn default_idle_interval() -> u64 {
        DEFAULT_IDLE_INTERVAL_SECS
    }

    fn default_heartbeat_interval() -> u64 {
        DEFAULT_HEARTBEAT_INTERVAL_SECS
    }

    fn default_heartbeat_stale() -> u64 {
        DEFAULT_HEARTBEAT_STALE_SECS
    }

    /// Heartbeat age limit as a chrono duration, clamped to a representable range
    pub fn stale_after(&self) -> chrono::Duration {
        let secs = u32::try_from(self.heartbeat_stale_secs).unwrap_or(u32::MAX);
        chrono::Duration::seconds(i64::from(secs))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Resolve configuration for the CLI.
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present, otherwise built-in defaults apply.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => {
                let config = Self::default();
                config.validate()?;
                config
            }
        };
        config.apply_port_override(std::env::var(PORT_ENV_VAR).ok().as_deref())?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a platform-assigned port, if one was given
    pub fn apply_port_override(&mut self, port: Option<&str>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            self.http.port = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{PORT_ENV_VAR} is not a valid port: {raw:?}"))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "worker.command must not be empty".to_string(),
            ));
        }

        let sup = &self.supervisor;
        if sup.idle_interval_secs == 0 || sup.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "supervisor intervals must be greater than zero".to_string(),
            ));
        }
        if sup.heartbeat_stale_secs < sup.heartbeat_interval_secs {
            return Err(ConfigError::Validation(format!(
                "supervisor.heartbeat_stale_secs ({}) must be at least heartbeat_interval_secs ({})",
                sup.heartbeat_stale_secs, sup.heartbeat_interval_secs
            )));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.worker.command_line(), "python3 bot.py");
        assert_eq!(config.worker.log_file, PathBuf::from("bot.log"));
        assert_eq!(config.worker.log_mode, LogMode::Truncate);
        assert!(config.worker.heartbeat_file.is_none());
        assert_eq!(config.supervisor.idle_interval_secs, 86400);
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_full_config_parses() {
        let config = AppConfig::from_toml(
            r#"
            [http]
            host = "127.0.0.1"
            port = 8080

            [service]
            name = "Test Bot"

            [worker]
            command = "node"
            args = ["index.js", "--polling"]
            log_file = "/var/log/bot.log"
            log_mode = "append"
            heartbeat_file = "/run/bot.json"

            [worker.env]
            NODE_ENV = "production"

            [supervisor]
            heartbeat_interval_secs = 5
            heartbeat_stale_secs = 15

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.service.name, "Test Bot");
        assert_eq!(config.service.description, DEFAULT_SERVICE_DESCRIPTION);
        assert_eq!(config.worker.command_line(), "node index.js --polling");
        assert_eq!(config.worker.log_mode, LogMode::Append);
        assert_eq!(
            config.worker.env.get("NODE_ENV").map(String::as_str),
            Some("production")
        );
        assert_eq!(config.supervisor.heartbeat_stale_secs, 15);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_unknown_log_mode_rejected() {
        let err = AppConfig::from_toml("[worker]\nlog_mode = \"rotate\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = AppConfig::from_toml("[worker]\ncommand = \"  \"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_stale_shorter_than_interval_rejected() {
        let err = AppConfig::from_toml(
            "[supervisor]\nheartbeat_interval_secs = 60\nheartbeat_stale_secs = 30",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_port_override() {
        let mut config = AppConfig::default();
        config.apply_port_override(Some("10000")).unwrap();
        assert_eq!(config.http.port, 10000);

        config.apply_port_override(None).unwrap();
        assert_eq!(config.http.port, 10000);

        assert!(config.apply_port_override(Some("not-a-port")).is_err());
    }

    #[test]
    fn test_default_log_filter_names_crate() {
        assert_eq!(DEFAULT_LOG_FILTER, "vigil=info,tower_http=info");
    }
}
