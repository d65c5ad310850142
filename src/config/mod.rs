//! Configuration loading for catalog-sync.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `CATALOG_SYNC_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::product::WIDEST_RECORD_PARAMS;

const ENV_PREFIX: &str = "CATALOG_SYNC_";

/// Application configuration derived from `CATALOG_SYNC_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default)]
    pub catalog_api: CatalogApiConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Connection settings for the upstream catalog API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CatalogApiConfig {
    /// GraphQL endpoint receiving every page and rebate query.
    ///
    /// Environment variable: `CATALOG_SYNC_CATALOG_API_URL`
    #[serde(default = "default_catalog_api_url")]
    pub url: String,

    /// Sent as the `x-api-key` header. Required outside `local`/`test`.
    ///
    /// Environment variable: `CATALOG_SYNC_CATALOG_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds (default: 30000)
    #[serde(default = "default_catalog_api_timeout_ms")]
    pub timeout_ms: u64,

    /// Total attempts per page fetch before giving up (default: 3)
    ///
    /// Environment variable: `CATALOG_SYNC_FETCH_MAX_ATTEMPTS`
    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,
}

/// Paging and bulk write limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct IngestionConfig {
    /// Items requested per page (default: 500)
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Bound parameter ceiling for a single bulk statement (default: 100)
    #[serde(default = "default_max_bound_params")]
    pub max_bound_params: usize,
}

/// Queue worker cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WorkerConfig {
    /// Idle poll interval in milliseconds (default: 1000)
    #[serde(default = "default_worker_tick_ms")]
    pub tick_ms: u64,

    /// Seconds a claimed message stays invisible before redelivery (default: 300)
    #[serde(default = "default_worker_visibility_timeout_seconds")]
    pub visibility_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            catalog_api: CatalogApiConfig::default(),
            ingestion: IngestionConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl Default for CatalogApiConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_api_url(),
            api_key: None,
            timeout_ms: default_catalog_api_timeout_ms(),
            fetch_max_attempts: default_fetch_max_attempts(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_bound_params: default_max_bound_params(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_worker_tick_ms(),
            visibility_timeout_seconds: default_worker_visibility_timeout_seconds(),
        }
    }
}

impl CatalogApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate endpoint and retry bounds
    pub fn validate(&self, profile: &str) -> Result<(), ConfigError> {
        Url::parse(&self.url).map_err(|source| ConfigError::InvalidCatalogApiUrl {
            value: self.url.clone(),
            source,
        })?;

        if !matches!(profile, "local" | "test") && self.api_key.is_none() {
            return Err(ConfigError::MissingCatalogApiKey);
        }

        if self.fetch_max_attempts == 0 || self.fetch_max_attempts > 10 {
            return Err(ConfigError::InvalidFetchMaxAttempts {
                value: self.fetch_max_attempts,
            });
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidCatalogApiTimeout {
                value: self.timeout_ms,
            });
        }

        Ok(())
    }
}

impl IngestionConfig {
    /// Validate paging and bulk write bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > 1000 {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }

        // Every record must fit in one statement.
        if self.max_bound_params < WIDEST_RECORD_PARAMS {
            return Err(ConfigError::InvalidMaxBoundParams {
                value: self.max_bound_params,
                min: WIDEST_RECORD_PARAMS,
            });
        }

        Ok(())
    }
}

impl WorkerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    /// Validate worker cadence bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms < 10 || self.tick_ms > 60_000 {
            return Err(ConfigError::InvalidWorkerTick { value: self.tick_ms });
        }

        if self.visibility_timeout_seconds == 0 {
            return Err(ConfigError::InvalidVisibilityTimeout {
                value: self.visibility_timeout_seconds,
            });
        }

        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.catalog_api.api_key.is_some() {
            config.catalog_api.api_key = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.catalog_api.validate(&self.profile)?;
        self.ingestion.validate()?;
        self.worker.validate()?;
        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://catalog-sync.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_catalog_api_url() -> String {
    "http://localhost:4000/api/graphql".to_string()
}

fn default_catalog_api_timeout_ms() -> u64 {
    30_000
}

fn default_fetch_max_attempts() -> u32 {
    3
}

fn default_page_size() -> u64 {
    500
}

fn default_max_bound_params() -> usize {
    100
}

fn default_worker_tick_ms() -> u64 {
    1000
}

fn default_worker_visibility_timeout_seconds() -> u64 {
    300 // 5 minutes
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid catalog api url '{value}': {source}")]
    InvalidCatalogApiUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("catalog api key is missing; set CATALOG_SYNC_CATALOG_API_KEY")]
    MissingCatalogApiKey,
    #[error("catalog api timeout must be positive, got {value}")]
    InvalidCatalogApiTimeout { value: u64 },
    #[error("fetch max attempts must be between 1 and 10, got {value}")]
    InvalidFetchMaxAttempts { value: u32 },
    #[error("page size must be between 1 and 1000, got {value}")]
    InvalidPageSize { value: u64 },
    #[error("max bound params must be at least {min} so every record fits one statement, got {value}")]
    InvalidMaxBoundParams { value: usize, min: usize },
    #[error("worker tick must be between 10 and 60000 milliseconds, got {value}")]
    InvalidWorkerTick { value: u64 },
    #[error("worker visibility timeout must be positive, got {value}")]
    InvalidVisibilityTimeout { value: u64 },
}

/// Loads configuration using layered `.env` files and `CATALOG_SYNC_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.<profile>`, `.env.<profile>.local`,
    /// then the process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_parsed(&mut layered, "DB_MAX_CONNECTIONS")
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let catalog_api = CatalogApiConfig {
            url: take_string(&mut layered, "CATALOG_API_URL")
                .unwrap_or_else(default_catalog_api_url),
            api_key: take_string(&mut layered, "CATALOG_API_KEY")
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            timeout_ms: take_parsed(&mut layered, "CATALOG_API_TIMEOUT_MS")
                .unwrap_or_else(default_catalog_api_timeout_ms),
            fetch_max_attempts: take_parsed(&mut layered, "FETCH_MAX_ATTEMPTS")
                .unwrap_or_else(default_fetch_max_attempts),
        };

        let ingestion = IngestionConfig {
            page_size: take_parsed(&mut layered, "PAGE_SIZE").unwrap_or_else(default_page_size),
            max_bound_params: take_parsed(&mut layered, "MAX_BOUND_PARAMS")
                .unwrap_or_else(default_max_bound_params),
        };

        let worker = WorkerConfig {
            tick_ms: take_parsed(&mut layered, "WORKER_TICK_MS")
                .unwrap_or_else(default_worker_tick_ms),
            visibility_timeout_seconds: take_parsed(
                &mut layered,
                "WORKER_VISIBILITY_TIMEOUT_SECONDS",
            )
            .unwrap_or_else(default_worker_visibility_timeout_seconds),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            catalog_api,
            ingestion,
            worker,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values.remove(key).filter(|v| !v.is_empty())
}

// Unparseable values fall back to the default rather than failing the load.
fn take_parsed<T: std::str::FromStr>(values: &mut BTreeMap<String, String>, key: &str) -> Option<T> {
    values.remove(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_for_local_profile() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingestion.page_size, 500);
        assert_eq!(config.catalog_api.fetch_max_attempts, 3);
    }

    #[test]
    fn api_key_required_outside_local_and_test() {
        let config = AppConfig {
            profile: "prod".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCatalogApiKey)
        ));
    }

    #[test]
    fn page_size_bounds() {
        let mut ingestion = IngestionConfig::default();
        ingestion.page_size = 0;
        assert!(ingestion.validate().is_err());
        ingestion.page_size = 1001;
        assert!(ingestion.validate().is_err());
        ingestion.page_size = 1000;
        assert!(ingestion.validate().is_ok());
    }

    #[test]
    fn bound_params_must_fit_widest_record() {
        let ingestion = IngestionConfig {
            page_size: 500,
            max_bound_params: WIDEST_RECORD_PARAMS - 1,
        };
        assert!(matches!(
            ingestion.validate(),
            Err(ConfigError::InvalidMaxBoundParams { .. })
        ));
    }

    #[test]
    fn redacted_json_masks_api_key() {
        let mut config = AppConfig::default();
        config.catalog_api.api_key = Some("super-secret".to_string());
        let json = config.redacted_json().expect("serialize config");
        assert!(!json.contains("super-secret"));
        assert!(json.contains("[REDACTED]"));
    }
}
