use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::mailbox::DEFAULT_MAX_RESULTS;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub tracker: TrackerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            tracker: TrackerConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the tracker reads mail from and keeps its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub table_path: PathBuf,
    pub mailbox_path: PathBuf,
    pub max_results: usize,
    pub keep_unidentified: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from("job_applications.csv"),
            mailbox_path: PathBuf::from("mailbox.json"),
            max_results: DEFAULT_MAX_RESULTS,
            keep_unidentified: false,
        }
    }
}

impl TrackerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let table_path = env::var("TRACKER_TABLE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.table_path);
        let mailbox_path = env::var("TRACKER_MAILBOX_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.mailbox_path);

        let max_results = match env::var("TRACKER_MAX_RESULTS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| ConfigError::InvalidMaxResults(raw))?,
            Err(_) => defaults.max_results,
        };

        let keep_unidentified = match env::var("TRACKER_KEEP_UNIDENTIFIED") {
            Ok(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidFlag {
                name: "TRACKER_KEEP_UNIDENTIFIED",
                value: raw,
            })?,
            Err(_) => defaults.keep_unidentified,
        };

        Ok(Self {
            table_path,
            mailbox_path,
            max_results,
            keep_unidentified,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMaxResults(String),
    InvalidFlag { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMaxResults(value) => write!(
                f,
                "TRACKER_MAX_RESULTS must be a positive integer, got '{value}'"
            ),
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidMaxResults(_)
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "TRACKER_TABLE_PATH",
            "TRACKER_MAILBOX_PATH",
            "TRACKER_MAX_RESULTS",
            "TRACKER_KEEP_UNIDENTIFIED",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.tracker, TrackerConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_tracker_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TRACKER_TABLE_PATH", "/tmp/apps.csv");
        env::set_var("TRACKER_MAX_RESULTS", "25");
        env::set_var("TRACKER_KEEP_UNIDENTIFIED", "yes");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.tracker.table_path, PathBuf::from("/tmp/apps.csv"));
        assert_eq!(config.tracker.max_results, 25);
        assert!(config.tracker.keep_unidentified);
        reset_env();
    }

    #[test]
    fn rejects_bad_tracker_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TRACKER_MAX_RESULTS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidMaxResults(_))
        ));

        reset_env();
        env::set_var("TRACKER_KEEP_UNIDENTIFIED", "maybe");
        let err = AppConfig::load().expect_err("flag rejected");
        assert!(err.to_string().contains("TRACKER_KEEP_UNIDENTIFIED"));
        reset_env();
    }
}
