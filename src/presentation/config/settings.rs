use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use super::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub broker: BrokerSettings,
    pub workers: WorkerSettings,
    pub limits: LimitSettings,
    pub retention: RetentionSettings,
    pub converter: ConverterSettings,
    pub staging: StagingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub provider: StoreProvider,
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub provider: StoreProvider,
    pub url: Option<String>,
    pub visibility_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl BrokerSettings {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub pool_size: usize,
    pub task_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub retry_backoff_max_ms: u64,
}

impl WorkerSettings {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitSettings {
    pub max_document_size_mb: u64,
    pub max_batch_documents: usize,
    pub sync_concurrency: usize,
    /// Deadline for downloading a document submitted by URL.
    pub url_fetch_timeout_secs: u64,
}

impl LimitSettings {
    pub fn max_document_size_bytes(&self) -> u64 {
        self.max_document_size_mb * 1024 * 1024
    }

    pub fn url_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.url_fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    pub job_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub stale_running_grace_secs: u64,
    pub stale_pending_grace_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterProvider {
    Http,
    PlainText,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConverterSettings {
    pub provider: ConverterProvider,
    pub endpoint: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingProvider {
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingSettings {
    pub provider: StagingProvider,
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.into(),
    }
}

impl Settings {
    /// Loads defaults, then `appsettings.{env}` if present, then `APP_`
    /// environment variables with `__` between nested keys (for example
    /// `APP_WORKERS__POOL_SIZE`), and validates the result.
    pub fn load(environment: Environment) -> Result<Self, SettingsError> {
        let settings: Settings = Self::builder()?
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.as_str())).required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("store.provider", "memory")?
            .set_default("store.max_connections", 10)?
            .set_default("broker.provider", "memory")?
            .set_default("broker.visibility_timeout_secs", 900)?
            .set_default("broker.poll_interval_ms", 500)?
            .set_default("workers.pool_size", 4)?
            .set_default("workers.task_timeout_secs", 600)?
            .set_default("workers.max_retries", 3)?
            .set_default("workers.retry_backoff_base_ms", 1000)?
            .set_default("workers.retry_backoff_max_ms", 60_000)?
            .set_default("limits.max_document_size_mb", 50)?
            .set_default("limits.max_batch_documents", 100)?
            .set_default("limits.sync_concurrency", 4)?
            .set_default("limits.url_fetch_timeout_secs", 60)?
            .set_default("retention.job_ttl_secs", 86_400)?
            .set_default("retention.sweep_interval_secs", 300)?
            .set_default("retention.stale_running_grace_secs", 120)?
            .set_default("retention.stale_pending_grace_secs", 300)?
            .set_default("converter.provider", "plain_text")?
            .set_default("converter.request_timeout_secs", 660)?
            .set_default("staging.provider", "local")?
            .set_default("staging.local_path", "./data/staging")?
            .set_default("logging.level", "info")?
            .set_default("logging.enable_json", false)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.workers.pool_size == 0 {
            return Err(invalid("workers.pool_size", "must be greater than zero"));
        }
        if self.workers.task_timeout_secs == 0 {
            return Err(invalid("workers.task_timeout_secs", "must be greater than zero"));
        }
        if self.workers.max_retries == 0 {
            return Err(invalid("workers.max_retries", "must allow at least one attempt"));
        }
        if self.workers.retry_backoff_max_ms < self.workers.retry_backoff_base_ms {
            return Err(invalid(
                "workers.retry_backoff_max_ms",
                "must not be lower than the backoff base",
            ));
        }
        if self.broker.visibility_timeout_secs <= self.workers.task_timeout_secs {
            return Err(invalid(
                "broker.visibility_timeout_secs",
                format!(
                    "must exceed workers.task_timeout_secs ({})",
                    self.workers.task_timeout_secs
                ),
            ));
        }
        if self.broker.poll_interval_ms == 0 {
            return Err(invalid("broker.poll_interval_ms", "must be greater than zero"));
        }
        if self.limits.max_document_size_mb == 0 {
            return Err(invalid("limits.max_document_size_mb", "must be greater than zero"));
        }
        if self.limits.max_batch_documents == 0 {
            return Err(invalid("limits.max_batch_documents", "must be greater than zero"));
        }
        if self.limits.sync_concurrency == 0 {
            return Err(invalid("limits.sync_concurrency", "must be greater than zero"));
        }
        if self.limits.url_fetch_timeout_secs == 0 {
            return Err(invalid("limits.url_fetch_timeout_secs", "must be greater than zero"));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(invalid("retention.sweep_interval_secs", "must be greater than zero"));
        }
        if self.store.provider == StoreProvider::Postgres && self.store.url.is_none() {
            return Err(invalid("store.url", "required for the postgres store"));
        }
        if self.broker.provider == StoreProvider::Postgres
            && self.broker.url.is_none()
            && self.store.url.is_none()
        {
            return Err(invalid("broker.url", "required for the postgres broker"));
        }
        if self.converter.provider == ConverterProvider::Http && self.converter.endpoint.is_none() {
            return Err(invalid("converter.endpoint", "required for the http converter"));
        }
        Ok(())
    }

    /// Connection string for the broker queue, falling back to the store's.
    pub fn broker_url(&self) -> Option<&str> {
        self.broker.url.as_deref().or(self.store.url.as_deref())
    }
}
