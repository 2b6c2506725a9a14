use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::verification::GracePeriodConfig;

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
    pub verification: VerificationConfig,
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
            verification: VerificationConfig::default(),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Tuning knobs for the verification pipeline.
///
/// Scores are compared with plain `>=`; there is no tolerance band, so the
/// same inputs always land on the same side of each threshold.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Distinct document types that must score complete before a decision
    /// can pass the completeness rule.
    pub min_complete_document_types: usize,
    /// Completeness score at or above which a document counts as complete.
    pub completeness_threshold: f32,
    /// Extraction confidence below which a document is flagged suspicious.
    pub low_confidence_threshold: f32,
    /// Name similarity below which a mismatch flag is raised.
    pub name_similarity_threshold: f32,
    /// Per-document cap covering the store fetch and text extraction.
    pub document_timeout: Duration,
    /// Per-registry-call cap; a slower registry degrades to not-found.
    pub registry_timeout: Duration,
    /// Cap on one whole verification run; sub-calls still in flight when it
    /// elapses are cancelled and degraded, completed ones are kept.
    pub run_budget: Duration,
    /// Upload size ceiling for verification documents.
    pub max_upload_bytes: u64,
    pub grace: GracePeriodConfig,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        VerificationConfig {
            min_complete_document_types: 2,
            completeness_threshold: 0.8,
            low_confidence_threshold: 0.7,
            name_similarity_threshold: 0.8,
            document_timeout: Duration::from_secs(3),
            registry_timeout: Duration::from_secs(2),
            run_budget: Duration::from_secs(10),
            max_upload_bytes: 10 * 1024 * 1024,
            grace: GracePeriodConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
