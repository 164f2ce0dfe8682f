//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use z_ledger_core::{
    Calendar, LedgerError, PlanCatalog, DEFAULT_MAX_BOOST_HOURS, DEFAULT_MIN_BOOST_CREDITS,
};
use z_ledger_engine::{EngineConfig, DEFAULT_COUNTER_RETENTION_DAYS, DEFAULT_EVENT_CAPACITY};
use z_ledger_store::{MemoryStore, Store};

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process tables. Data is lost on restart.
    Memory,
    /// `RocksDB` under `data_dir`. Needs the `rocksdb-backend` feature.
    RocksDb,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "rocksdb" | "rocks" => Some(Self::RocksDb),
            _ => None,
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/z-ledger").
    pub data_dir: String,

    /// Storage backend (default: memory).
    pub store_backend: StoreBackend,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for operator endpoints.
    pub admin_api_key: Option<String>,

    /// Shared secret for payment webhook signatures (optional).
    pub payment_webhook_secret: Option<String>,

    /// Where domain events are POSTed (optional).
    pub notification_webhook_url: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Deadline for one atomic store unit, in milliseconds.
    pub commit_timeout_ms: u64,

    /// Smallest credit offer accepted for a boost.
    pub min_boost_credits: i64,

    /// Longest boost, in hours.
    pub max_boost_hours: u32,

    /// Offset of the canonical calendar from UTC, in minutes.
    pub day_offset_minutes: i32,

    /// Interval of the expired-boost sweep and counter prune (0 disables it).
    pub boost_sweep_interval_seconds: u64,

    /// Counter rows older than this many days are pruned.
    pub counter_retention_days: u32,

    /// JSON file overriding the built-in plan catalog (optional).
    pub plan_catalog_path: Option<String>,
}

/// Ledger secrets file structure.
#[derive(Debug, Deserialize)]
struct LedgerSecrets {
    #[serde(default)]
    service_api_key: Option<String>,
    #[serde(default)]
    admin_api_key: Option<String>,
    #[serde(default)]
    payment_webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let secrets = load_ledger_secrets();
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            store_backend: std::env::var("STORE_BACKEND")
                .ok()
                .and_then(|s| {
                    let backend = StoreBackend::parse(&s);
                    if backend.is_none() {
                        tracing::warn!(value = %s, "Unknown STORE_BACKEND, using memory");
                    }
                    backend
                })
                .unwrap_or(defaults.store_backend),
            service_api_key: secrets
                .service_api_key
                .or_else(|| std::env::var("SERVICE_API_KEY").ok()),
            admin_api_key: secrets
                .admin_api_key
                .or_else(|| std::env::var("ADMIN_API_KEY").ok()),
            payment_webhook_secret: secrets
                .payment_webhook_secret
                .or_else(|| std::env::var("PAYMENT_WEBHOOK_SECRET").ok()),
            notification_webhook_url: std::env::var("NOTIFICATION_WEBHOOK_URL").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            commit_timeout_ms: env_parse("COMMIT_TIMEOUT_MS").unwrap_or(defaults.commit_timeout_ms),
            min_boost_credits: env_parse("MIN_BOOST_CREDITS")
                .unwrap_or(defaults.min_boost_credits),
            max_boost_hours: env_parse("MAX_BOOST_HOURS").unwrap_or(defaults.max_boost_hours),
            day_offset_minutes: env_parse("DAY_OFFSET_MINUTES")
                .unwrap_or(defaults.day_offset_minutes),
            boost_sweep_interval_seconds: env_parse("BOOST_SWEEP_INTERVAL_SECONDS")
                .unwrap_or(defaults.boost_sweep_interval_seconds),
            counter_retention_days: env_parse("COUNTER_RETENTION_DAYS")
                .unwrap_or(defaults.counter_retention_days),
            plan_catalog_path: std::env::var("PLAN_CATALOG_PATH").ok(),
        }
    }

    /// Per-unit store lock deadline.
    #[must_use]
    pub const fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    /// Engine knobs derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the day offset is out of range.
    pub fn engine_config(&self) -> Result<EngineConfig, LedgerError> {
        Ok(EngineConfig {
            min_boost_credits: self.min_boost_credits,
            max_boost_hours: self.max_boost_hours,
            calendar: Calendar::with_offset_minutes(self.day_offset_minutes)?,
            subject_lock_timeout: self.commit_timeout(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            counter_retention_days: self.counter_retention_days,
        })
    }

    /// The plan catalog: the file at `plan_catalog_path` if set, otherwise
    /// the built-in one.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if the file cannot be read or parsed.
    pub fn plan_catalog(&self) -> Result<PlanCatalog, LedgerError> {
        let Some(path) = &self.plan_catalog_path else {
            return Ok(PlanCatalog::default());
        };

        let contents = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Configuration(format!("reading {path}: {e}")))?;
        let catalog = PlanCatalog::from_json(&contents)?;
        tracing::info!(path = %path, "Loaded plan catalog from file");
        Ok(catalog)
    }

    /// Open the configured storage backend.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if `RocksDB` was requested but not
    /// compiled in, or a storage error if it cannot be opened.
    pub fn open_store(&self) -> Result<Arc<dyn Store>, LedgerError> {
        match self.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store - data will not survive a restart");
                Ok(Arc::new(MemoryStore::with_lock_timeout(self.commit_timeout())))
            }
            #[cfg(feature = "rocksdb-backend")]
            StoreBackend::RocksDb => {
                tracing::info!(path = %self.data_dir, "Opening RocksDB store");
                let store = z_ledger_store::RocksStore::open_with_lock_timeout(
                    &self.data_dir,
                    self.commit_timeout(),
                )?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "rocksdb-backend"))]
            StoreBackend::RocksDb => Err(LedgerError::Configuration(
                "STORE_BACKEND=rocksdb needs the rocksdb-backend feature".into(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Load ledger secrets from file, leaving unset fields to the environment.
fn load_ledger_secrets() -> LedgerSecrets {
    let secret_paths = [
        ".secrets/ledger.json",
        "z-ledger/.secrets/ledger.json",
        "../.secrets/ledger.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<LedgerSecrets>(path) {
            tracing::info!(path = %path, "Loaded ledger secrets from file");
            return secrets;
        }
    }

    tracing::debug!("Ledger secrets file not found, using environment variables");
    LedgerSecrets {
        service_api_key: None,
        admin_api_key: None,
        payment_webhook_secret: None,
    }
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/z-ledger".into(),
            store_backend: StoreBackend::Memory,
            service_api_key: None,
            admin_api_key: None,
            payment_webhook_secret: None,
            notification_webhook_url: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            commit_timeout_ms: 2_000,
            min_boost_credits: DEFAULT_MIN_BOOST_CREDITS,
            max_boost_hours: DEFAULT_MAX_BOOST_HOURS,
            day_offset_minutes: 0,
            boost_sweep_interval_seconds: 60,
            counter_retention_days: DEFAULT_COUNTER_RETENTION_DAYS,
            plan_catalog_path: None,
        }
    }
}
