//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the notice list is fetched from
    #[serde(default)]
    pub source: SourceConfig,

    /// Downstream messaging gateway
    #[serde(default)]
    pub transport: TransportConfig,

    /// Delivery pacing, retries and message layout
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Warm-up delay and recurring periods
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Ledger persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query API bind address
    #[serde(default)]
    pub server: ServerConfig,

    /// Log filter
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.source.url)
            .map_err(|e| AppError::validation(format!("source.url is invalid: {e}")))?;
        url::Url::parse(&self.transport.endpoint)
            .map_err(|e| AppError::validation(format!("transport.endpoint is invalid: {e}")))?;
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.transport.timeout_secs == 0 {
            return Err(AppError::validation("transport.timeout_secs must be > 0"));
        }
        if self.transport.session.trim().is_empty() {
            return Err(AppError::validation("transport.session is empty"));
        }
        if self.delivery.destination.trim().is_empty() {
            return Err(AppError::validation("delivery.destination is empty"));
        }
        if self.delivery.max_attempts == 0 {
            return Err(AppError::validation("delivery.max_attempts must be > 0"));
        }
        if self.delivery.template.trim().is_empty() {
            return Err(AppError::validation("delivery.template is empty"));
        }
        if self.schedule.ingest_interval_secs == 0 {
            return Err(AppError::validation(
                "schedule.ingest_interval_secs must be > 0",
            ));
        }
        if self.schedule.retry_interval_secs == 0 {
            return Err(AppError::validation(
                "schedule.retry_interval_secs must be > 0",
            ));
        }
        if self.storage.ledger_path.as_os_str().is_empty() {
            return Err(AppError::validation("storage.ledger_path is empty"));
        }
        Ok(())
    }
}

/// Notice list source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL returning the notice list
    #[serde(default = "defaults::source_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::source_timeout")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::source_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::source_timeout(),
        }
    }
}

/// Messaging gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Gateway base URL; messages are posted to `{endpoint}/api/sendText`
    #[serde(default = "defaults::transport_endpoint")]
    pub endpoint: String,

    /// Gateway session name
    #[serde(default = "defaults::session")]
    pub session: String,

    /// Upper bound for a single send, in seconds
    #[serde(default = "defaults::transport_timeout")]
    pub timeout_secs: u64,
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::transport_endpoint(),
            session: defaults::session(),
            timeout_secs: defaults::transport_timeout(),
        }
    }
}

/// Delivery behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Channel identifier every notice is sent to
    #[serde(default = "defaults::destination")]
    pub destination: String,

    /// Pause between consecutive sends in milliseconds
    #[serde(default = "defaults::pacing")]
    pub pacing_ms: u64,

    /// Total send attempts per notice, the first one included
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Message template, see [`crate::models::Notice::format`]
    #[serde(default = "defaults::template")]
    pub template: String,
}

impl DeliveryConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            destination: defaults::destination(),
            pacing_ms: defaults::pacing(),
            max_attempts: defaults::max_attempts(),
            template: defaults::template(),
        }
    }
}

/// Recurring activity periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Delay before the first ingestion cycle, giving the gateway time to start
    #[serde(default = "defaults::warmup")]
    pub warmup_secs: u64,

    #[serde(default = "defaults::ingest_interval")]
    pub ingest_interval_secs: u64,

    #[serde(default = "defaults::retry_interval")]
    pub retry_interval_secs: u64,
}

impl ScheduleConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn ingest_interval(&self) -> Duration {
        Duration::from_secs(self.ingest_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            warmup_secs: defaults::warmup(),
            ingest_interval_secs: defaults::ingest_interval(),
            retry_interval_secs: defaults::retry_interval(),
        }
    }
}

/// Ledger storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding delivered fingerprints
    #[serde(default = "defaults::ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: defaults::ledger_path(),
        }
    }
}

/// Query API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn source_url() -> String {
        "https://gestiondocente.info.unlp.edu.ar/cartelera/data/0/10".into()
    }
    pub fn user_agent() -> String {
        crate::utils::http::DEFAULT_USER_AGENT.into()
    }
    pub fn source_timeout() -> u64 {
        60
    }

    // Transport defaults
    pub fn transport_endpoint() -> String {
        "http://localhost:3000".into()
    }
    pub fn session() -> String {
        "default".into()
    }
    pub fn transport_timeout() -> u64 {
        20
    }

    // Delivery defaults
    pub fn destination() -> String {
        "120363420856183423@newsletter".into()
    }
    pub fn pacing() -> u64 {
        1000
    }
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn template() -> String {
        "📌 *{subject}* - {title}\n🗓️ {date}\n🧑‍🏫 {author}\n📝 {body}".into()
    }

    // Schedule defaults
    pub fn warmup() -> u64 {
        300
    }
    pub fn ingest_interval() -> u64 {
        300
    }
    pub fn retry_interval() -> u64 {
        60
    }

    pub fn ledger_path() -> PathBuf {
        PathBuf::from("data/delivered.json")
    }

    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        4000
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
