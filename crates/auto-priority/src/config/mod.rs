use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::assignment::engine::FormulaFailurePolicy;
use crate::assignment::supervisor::DEFAULT_MAX_ATTEMPTS;

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
    pub assignment: AssignmentConfig,
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

        let max_attempts = match env::var("APP_MAX_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidMaxAttempts)?,
            Err(_) => DEFAULT_MAX_ATTEMPTS,
        };

        let formula_failures = match env::var("APP_FORMULA_FAILURES") {
            Ok(raw) => parse_formula_policy(&raw)
                .ok_or(ConfigError::InvalidFormulaPolicy { value: raw })?,
            Err(_) => FormulaFailurePolicy::default(),
        };

        let settings_path = env::var("APP_SETTINGS_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            assignment: AssignmentConfig {
                max_attempts,
                formula_failures,
                settings_path,
            },
        })
    }
}

fn parse_formula_policy(value: &str) -> Option<FormulaFailurePolicy> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "retry_pass" | "retry" => Some(FormulaFailurePolicy::RetryPass),
        "rank_last" => Some(FormulaFailurePolicy::RankLast),
        _ => None,
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

/// Retry bound, formula failure handling, and where settings persist.
#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    pub max_attempts: u32,
    pub formula_failures: FormulaFailurePolicy,
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMaxAttempts,
    InvalidFormulaPolicy { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMaxAttempts => {
                write!(f, "APP_MAX_ATTEMPTS must be a positive integer")
            }
            ConfigError::InvalidFormulaPolicy { value } => write!(
                f,
                "APP_FORMULA_FAILURES must be 'retry_pass' or 'rank_last' (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidMaxAttempts
            | ConfigError::InvalidFormulaPolicy { .. } => None,
        }
    }
}
