//! SQLite backend configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BACKEND_NAME, BackendError, StorageResult};
use crate::search::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::tenant::NamespaceConfig;

/// Configuration for the SQLite backend.
///
/// `data_dir` holds the tenant catalog (`catalog.db`) and one database file
/// per tenant namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Directory holding the catalog and namespace databases.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_idle")]
    pub min_idle: u32,

    /// How long a caller waits for a pooled connection, in milliseconds.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable WAL mode on catalog and namespace databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Namespace naming rules.
    #[serde(default)]
    pub namespace: NamespaceConfig,

    /// Page size applied when a caller passes a limit of zero.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on a single page.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_idle() -> u32 {
    1
}

fn default_acquire_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_connections: default_max_connections(),
            min_idle: default_min_idle(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            namespace: NamespaceConfig::default(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl SqliteBackendConfig {
    /// Creates a configuration rooted at `data_dir` with default settings.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the maximum pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self.min_idle = self.min_idle.min(max_connections);
        self
    }

    /// Sets the acquisition timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Creates configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CDR_DATA_DIR` | `data` |
    /// | `CDR_MAX_CONNECTIONS` | `10` |
    /// | `CDR_MIN_IDLE` | `1` |
    /// | `CDR_ACQUIRE_TIMEOUT_MS` | `30000` |
    /// | `CDR_BUSY_TIMEOUT_MS` | `5000` |
    /// | `CDR_ENABLE_WAL` | `true` |
    /// | `CDR_NAMESPACE_PREFIX` | `tenant_` |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            match lookup(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
                    default
                }),
                None => default,
            }
        }

        let defaults = Self::default();
        let mut namespace = defaults.namespace.clone();
        if let Some(prefix) = lookup("CDR_NAMESPACE_PREFIX") {
            namespace.prefix = prefix;
        }

        Self {
            data_dir: lookup("CDR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_connections: parsed(&lookup, "CDR_MAX_CONNECTIONS", defaults.max_connections),
            min_idle: parsed(&lookup, "CDR_MIN_IDLE", defaults.min_idle),
            acquire_timeout_ms: parsed(&lookup, "CDR_ACQUIRE_TIMEOUT_MS", defaults.acquire_timeout_ms),
            busy_timeout_ms: parsed(&lookup, "CDR_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms),
            enable_wal: parsed(&lookup, "CDR_ENABLE_WAL", defaults.enable_wal),
            namespace,
            default_page_size: defaults.default_page_size,
            max_page_size: defaults.max_page_size,
        }
    }

    /// Checks the settings that cannot be repaired when the pool is built.
    ///
    /// A pool size, acquisition timeout or page size of zero is rejected.
    /// `min_idle` above `max_connections` is not an error; the pool clamps it.
    pub fn validate(&self) -> StorageResult<()> {
        let problem = if self.max_connections == 0 {
            Some("max_connections must be at least 1")
        } else if self.acquire_timeout_ms == 0 {
            Some("acquire_timeout_ms must be at least 1")
        } else if self.default_page_size == 0 || self.max_page_size == 0 {
            Some("page sizes must be at least 1")
        } else {
            None
        };
        match problem {
            Some(message) => Err(BackendError::InvalidConfiguration {
                backend_name: BACKEND_NAME.to_string(),
                message: message.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Idle connections the pool keeps, never more than its maximum size.
    pub fn effective_min_idle(&self) -> u32 {
        self.min_idle.min(self.max_connections)
    }

    /// Acquisition timeout as a [`Duration`].
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Path of the tenant catalog database.
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SqliteBackendConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(config.namespace.prefix, "tenant_");
        assert_eq!(config.default_page_size, 20);
        assert!(config.enable_wal);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: SqliteBackendConfig =
            serde_json::from_str(r#"{"data_dir": "/var/lib/cdr", "max_connections": 4}"#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/cdr"));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.namespace, NamespaceConfig::default());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("CDR_DATA_DIR", "/tmp/cdr"),
            ("CDR_MAX_CONNECTIONS", "3"),
            ("CDR_ACQUIRE_TIMEOUT_MS", "not-a-number"),
            ("CDR_ENABLE_WAL", "false"),
            ("CDR_NAMESPACE_PREFIX", "t_"),
        ]
        .into_iter()
        .collect();
        let config = SqliteBackendConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/cdr"));
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.acquire_timeout_ms, 30000);
        assert!(!config.enable_wal);
        assert_eq!(config.namespace.prefix, "t_");
        assert_eq!(config.catalog_path(), PathBuf::from("/tmp/cdr/catalog.db"));
    }

    #[test]
    fn test_validate_rejects_unusable_pool_settings() {
        for vars in [
            [("CDR_MAX_CONNECTIONS", "0")],
            [("CDR_ACQUIRE_TIMEOUT_MS", "0")],
        ] {
            let vars: HashMap<&str, &str> = vars.into_iter().collect();
            let config =
                SqliteBackendConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
            let err = config.validate().unwrap_err();
            assert!(
                matches!(
                    err,
                    crate::StorageError::Backend(BackendError::InvalidConfiguration { .. })
                ),
                "got {err:?}"
            );
        }

        let config = SqliteBackendConfig {
            max_page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(SqliteBackendConfig::default().validate().is_ok());
    }

    #[test]
    fn test_min_idle_is_clamped_to_pool_size() {
        let vars: HashMap<&str, &str> =
            [("CDR_MIN_IDLE", "20"), ("CDR_MAX_CONNECTIONS", "4")].into_iter().collect();
        let config = SqliteBackendConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert!(config.validate().is_ok());
        assert_eq!(config.min_idle, 20);
        assert_eq!(config.effective_min_idle(), 4);
    }

    #[test]
    fn test_acquire_timeout_saturates() {
        let config = SqliteBackendConfig::default().with_acquire_timeout(Duration::MAX);
        assert_eq!(config.acquire_timeout_ms, u64::MAX);
        let config = SqliteBackendConfig::default().with_acquire_timeout(Duration::from_millis(250));
        assert_eq!(config.acquire_timeout_ms, 250);
    }
}
