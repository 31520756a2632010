#![allow(dead_code)]
//! Configuration management for the Mira Engine
//!
//! Provides strongly-typed configuration with validation, environment variable parsing,
//! and sensible defaults. Supports both development and production environments.
//!
//! # Example
//! ```no_run
//! use mira::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("API port: {}", config.api.port);
//! ```

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// API server configuration
    pub api: ApiConfig,
    /// Recommendation engine configuration
    pub recommendation: RecommendationConfig,
    /// Usage accounting configuration
    pub usage: UsageConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    /// Enable statement caching
    pub statement_cache_size: usize,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

/// Recommendation engine configuration
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Cache TTL for recommendations
    pub cache_ttl: Duration,
    /// Maximum candidates to consider per ranking request
    pub max_candidates: usize,
    /// How far back interaction history feeds the affinity signals
    pub signal_window_days: i64,
    /// How often to refresh denormalized popularity counters
    pub popularity_update_interval: Duration,
    /// Concurrent cache warmups during the periodic update
    pub warmup_concurrency: usize,
}

/// Usage accounting configuration
#[derive(Debug, Clone)]
pub struct UsageConfig {
    /// Maximum usage rows fetched per summary query
    pub summary_row_limit: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Prefer loading env from a directory of files (FFOLDER) for platforms that mount secrets as files.
        // Each file name is the env var name and its contents is the value.
        if let Ok(folder) = std::env::var("FFOLDER") {
            let p = std::path::Path::new(&folder);
            if p.is_dir() {
                match std::fs::read_dir(p) {
                    Ok(entries) => {
                        for entry in entries.flatten() {
                            if let Ok(fname) = entry.file_name().into_string() {
                                let fpath = entry.path();
                                if fpath.is_file() {
                                    if let Ok(mut contents) = std::fs::read_to_string(&fpath) {
                                        // Trim trailing newlines/spaces
                                        contents = contents.trim().to_string();
                                        // Only set env var if not already set in the environment
                                        if std::env::var(&fname).is_err() {
                                            std::env::set_var(&fname, contents);
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(err) => {
                        log::warn!("Failed to read FFOLDER {}: {}", folder, err);
                    }
                }
                log::info!("Loaded configuration from FFOLDER={}", folder);
            }
        } else {
            // Try to load .env file (ignore if not found)
            dotenvy::dotenv().ok();
        }

        let config = Self {
            database: DatabaseConfig::from_env()?,
            api: ApiConfig::from_env()?,
            recommendation: RecommendationConfig::from_env()?,
            usage: UsageConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: "Database URL cannot be empty".into(),
            });
        }

        // Validate pool size
        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        if self.recommendation.max_candidates == 0 {
            return Err(Error::InvalidConfig {
                key: "REC_MAX_CANDIDATES",
                message: "max_candidates must be > 0".into(),
            });
        }

        if self.recommendation.warmup_concurrency == 0 {
            return Err(Error::InvalidConfig {
                key: "REC_WARMUP_CONCURRENCY",
                message: "warmup_concurrency must be > 0".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!("    URL: {}", mask_url(&self.database.url));
        info!(
            "    Pool Size: {}-{}",
            self.database.min_connections, self.database.max_connections
        );
        info!("  API:");
        info!("    Listening on: {}:{}", self.api.host, self.api.port);
        info!("  Recommendation:");
        info!("    Cache TTL: {:?}", self.recommendation.cache_ttl);
        info!("    Max Candidates: {}", self.recommendation.max_candidates);
        info!(
            "    Signal Window: {} days",
            self.recommendation.signal_window_days
        );
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost/mira_dev", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_or("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: get_env_or("DB_MIN_CONNECTIONS", "5").parse().unwrap_or(5),
            connect_timeout: Duration::from_secs(
                get_env_or("DB_CONNECT_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            idle_timeout: Duration::from_secs(
                get_env_or("DB_IDLE_TIMEOUT_SECS", "600")
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                get_env_or("DB_MAX_LIFETIME_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            statement_cache_size: get_env_or("DB_STATEMENT_CACHE_SIZE", "100")
                .parse()
                .unwrap_or(100),
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            port: get_env_or("API_PORT", "8080").parse().unwrap_or(8080),
            host: get_env_or("API_HOST", "0.0.0.0"),
            request_timeout: Duration::from_secs(
                get_env_or("API_REQUEST_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            max_body_size: get_env_or("API_MAX_BODY_SIZE", "10485760")
                .parse()
                .unwrap_or(10 * 1024 * 1024),
            cors_enabled: get_env_or("API_CORS_ENABLED", "true")
                .parse()
                .unwrap_or(true),
            cors_origins: get_env_or("API_CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
        })
    }
}

impl RecommendationConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            cache_ttl: Duration::from_secs(
                get_env_or("REC_CACHE_TTL_SECS", "300")
                    .parse()
                    .unwrap_or(300),
            ),
            max_candidates: get_env_or("REC_MAX_CANDIDATES", "1000")
                .parse()
                .unwrap_or(1000),
            signal_window_days: get_env_or("REC_SIGNAL_WINDOW_DAYS", "90")
                .parse()
                .unwrap_or(90),
            popularity_update_interval: Duration::from_secs(
                get_env_or("REC_POPULARITY_UPDATE_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            warmup_concurrency: get_env_or("REC_WARMUP_CONCURRENCY", "10")
                .parse()
                .unwrap_or(10),
        })
    }
}

impl UsageConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            summary_row_limit: get_env_or("USAGE_SUMMARY_ROW_LIMIT", "10000")
                .parse()
                .unwrap_or(10000),
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse environment variable
fn get_env_parsed<T: std::str::FromStr>(key: &'static str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let value = get_env(key)?;
    value.parse().map_err(|e: T::Err| Error::InvalidConfig {
        key,
        message: format!("Invalid value '{}': {}", value, e).into(),
    })
}

/// Mask sensitive parts of URL
fn mask_url(url: &str) -> String {
    // Mask password if present
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let (before, after) = url.split_at(colon_pos + 1);
            let (_, rest) = after.split_at(at_pos - colon_pos - 1);
            return format!("{}****{}", before, rest);
        }
    }
    url.to_string()
}
