//! Sync engine configuration

use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Sync controller configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PLANDB_CLIENT_NAME | plandb-client | name sent as SET provenance |
/// | PLANDB_REQUEST_TIMEOUT_MS | 10000 | deadline for a reply |
/// | PLANDB_SWEEP_INTERVAL_MS | 1000 | pending table sweep period |
/// | PLANDB_STATE_MAX_AGE_MS | 20000 | catalog age before a GET_STATE poll |
/// | PLANDB_AUTO_REFRESH | true | poll stale catalogs from the sweeper |
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Client name, sent with SET requests as provenance
    pub client_name: String,
    /// How long an issued request may wait for its reply
    pub request_timeout: Duration,
    /// Period of the pending-request sweeper
    pub sweep_interval: Duration,
    /// Age after which the mirrored catalog is considered stale
    pub state_max_age: Duration,
    /// Whether the maintenance task polls stale catalogs
    pub auto_refresh: bool,
    /// Capacity of the catalog event broadcast channel
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            client_name: "plandb-client".to_string(),
            request_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            state_max_age: Duration::from_secs(20),
            auto_refresh: true,
            event_capacity: 256,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Low-latency links (wired / wifi)
    ///
    /// Replies arrive within milliseconds; lost requests surface quickly.
    pub fn lan() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            sweep_interval: Duration::from_millis(500),
            state_max_age: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// High-latency, lossy links (satellite / acoustic)
    ///
    /// Replies may take minutes; the catalog is polled less often.
    pub fn wan() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(5),
            state_max_age: Duration::from_secs(300),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> SyncResult<Self> {
        let defaults = Self::default();
        let config = Self {
            client_name: std::env::var("PLANDB_CLIENT_NAME").unwrap_or(defaults.client_name),
            request_timeout: env_millis("PLANDB_REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.request_timeout),
            sweep_interval: env_millis("PLANDB_SWEEP_INTERVAL_MS")?
                .unwrap_or(defaults.sweep_interval),
            state_max_age: env_millis("PLANDB_STATE_MAX_AGE_MS")?
                .unwrap_or(defaults.state_max_age),
            auto_refresh: std::env::var("PLANDB_AUTO_REFRESH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_refresh),
            event_capacity: defaults.event_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> SyncResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(SyncError::Config("sweep_interval must be non-zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Config("request_timeout must be non-zero".into()));
        }
        if self.event_capacity == 0 {
            return Err(SyncError::Config("event_capacity must be non-zero".into()));
        }
        Ok(())
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_state_max_age(mut self, max_age: Duration) -> Self {
        self.state_max_age = max_age;
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Provenance note attached to SET requests
    pub fn provenance_note(&self) -> String {
        format!("{} {}", self.client_name, env!("CARGO_PKG_VERSION"))
    }
}

fn env_millis(key: &str) -> SyncResult<Option<Duration>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| SyncError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}
