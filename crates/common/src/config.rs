//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// HTTP requests per publish attempt (create the container, then publish it).
const PUBLISH_PHASES: u64 = 2;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Publish worker configuration.
    #[serde(default)]
    pub worker: WorkerSettings,
    /// Publishing API configuration.
    #[serde(default)]
    pub publisher: PublisherSettings,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret the external scheduler sends as a bearer token.
    /// When unset the trigger endpoint is open.
    #[serde(default)]
    pub cron_secret: Option<String>,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Publish worker tuning.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WorkerSettings {
    /// Only jobs scheduled within this many trailing hours are scanned.
    #[serde(default = "default_lookback_hours")]
    #[validate(range(min = 1, max = 168))]
    pub lookback_hours: u32,
    /// Upper bound on rows returned by a single list query.
    #[serde(default = "default_scan_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub scan_limit: u64,
    /// Seconds a job may stay `in_progress` before it is reclaimed.
    #[serde(default = "default_stale_after_secs")]
    #[validate(range(min = 60))]
    pub stale_after_secs: u64,
    /// Lower bound of the randomized pause between thread steps.
    #[serde(default = "default_jitter_min_secs")]
    pub jitter_min_secs: u64,
    /// Upper bound of the randomized pause between thread steps.
    #[serde(default = "default_jitter_max_secs")]
    #[validate(range(max = 600))]
    pub jitter_max_secs: u64,
    /// Attempts per publish call, including the first.
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    /// Base delay for linear backoff (`attempt * base`).
    #[serde(default = "default_base_delay_secs")]
    #[validate(range(max = 60))]
    pub base_delay_secs: u64,
}

/// Publishing API client configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublisherSettings {
    /// Base URL of the Threads Graph API, including the version segment.
    #[serde(default = "default_publisher_base_url")]
    #[validate(url)]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_min_connections() -> u32 {
    1
}

const fn default_lookback_hours() -> u32 {
    24
}

const fn default_scan_limit() -> u64 {
    100
}

const fn default_stale_after_secs() -> u64 {
    600
}

const fn default_jitter_min_secs() -> u64 {
    30
}

const fn default_jitter_max_secs() -> u64 {
    90
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_secs() -> u64 {
    2
}

fn default_publisher_base_url() -> String {
    "https://graph.threads.net/v1.0".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "threadcast=info,tower_http=info".to_string()
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            scan_limit: default_scan_limit(),
            stale_after_secs: default_stale_after_secs(),
            jitter_min_secs: default_jitter_min_secs(),
            jitter_max_secs: default_jitter_max_secs(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

impl WorkerSettings {
    /// Longest gap between two writes to a job while it is being published.
    ///
    /// `updated_at` moves after every step, so a single step has to fit under
    /// the staleness threshold. The bound covers the pause before the step
    /// plus every attempt timing out in both phases with backoff in between.
    #[must_use]
    pub const fn worst_case_step_secs(&self, request_timeout_secs: u64) -> u64 {
        let attempts = self.max_attempts as u64;
        let requests = attempts * PUBLISH_PHASES * request_timeout_secs;
        let backoff = self.base_delay_secs * (attempts * attempts.saturating_sub(1) / 2);
        self.jitter_max_secs + requests + backoff
    }

    /// Staleness threshold as a [`Duration`].
    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Validate field ranges and the relations between them, including the
    /// staleness threshold against the publisher's request timeout.
    pub fn check(&self, publisher: &PublisherSettings) -> AppResult<()> {
        self.validate()?;

        if self.jitter_min_secs > self.jitter_max_secs {
            return Err(AppError::Validation(format!(
                "jitter_min_secs ({}) must not exceed jitter_max_secs ({})",
                self.jitter_min_secs, self.jitter_max_secs
            )));
        }

        // A threshold shorter than a live step lets the reclaimer steal a job mid-sequence.
        let worst_case = self.worst_case_step_secs(publisher.request_timeout_secs);
        if self.stale_after_secs <= worst_case {
            return Err(AppError::Validation(format!(
                "stale_after_secs ({}) must exceed the worst-case step time ({worst_case}s)",
                self.stale_after_secs
            )));
        }

        Ok(())
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            base_url: default_publisher_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `THREADCAST_ENV`)
    /// 3. Environment variables with `THREADCAST__` prefix
    pub fn load() -> AppResult<Self> {
        let env = std::env::var("THREADCAST_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("THREADCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("THREADCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section that carries constraints.
    pub fn validate(&self) -> AppResult<()> {
        self.publisher.validate()?;
        self.worker.check(&self.publisher)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_defaults() {
        let worker = WorkerSettings::default();
        assert_eq!(worker.lookback_hours, 24);
        assert_eq!(worker.stale_after(), Duration::from_secs(600));
        assert_eq!(worker.jitter_min_secs, 30);
        assert_eq!(worker.jitter_max_secs, 90);
        assert_eq!(worker.max_attempts, 3);
        assert!(worker.check(&PublisherSettings::default()).is_ok());
    }

    #[test]
    fn test_worst_case_step() {
        let worker = WorkerSettings::default();
        // 90s of jitter, 3 attempts * 2 phases * 30s, then 2s + 4s of backoff
        assert_eq!(worker.worst_case_step_secs(30), 276);
        assert_eq!(worker.worst_case_step_secs(120), 816);
    }

    #[test]
    fn test_long_request_timeout_rejected() {
        let worker = WorkerSettings::default();
        let publisher = PublisherSettings {
            request_timeout_secs: 120,
            ..Default::default()
        };
        let err = worker.check(&publisher).unwrap_err();
        assert!(err.to_string().contains("816s"));
    }

    #[test]
    fn test_inverted_jitter_rejected() {
        let worker = WorkerSettings {
            jitter_min_secs: 100,
            jitter_max_secs: 50,
            ..Default::default()
        };
        assert!(matches!(
            worker.check(&PublisherSettings::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_stale_threshold_must_exceed_step_time() {
        let worker = WorkerSettings {
            stale_after_secs: 120,
            ..Default::default()
        };
        assert!(matches!(
            worker.check(&PublisherSettings::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_attempts_rejected() {
        let worker = WorkerSettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(worker.check(&PublisherSettings::default()).is_err());
    }

    #[test]
    fn test_publisher_defaults() {
        let publisher = PublisherSettings::default();
        assert_eq!(publisher.base_url, "https://graph.threads.net/v1.0");
        assert!(publisher.validate().is_ok());
    }
}
