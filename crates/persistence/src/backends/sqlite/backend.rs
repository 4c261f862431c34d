//! SQLite backend: connection pool, tenant provisioning and scoped execution.

use std::fmt::Debug;
use std::panic;
use std::path::Path;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, DatabaseName};
use tracing::Instrument;

use crate::error::{BACKEND_NAME, BackendError, StorageError, StorageResult, TenantError};
use crate::search::register_functions;
use crate::tenant::{Namespace, NamespaceStrategy, TenantContext, TenantId};

use super::catalog::{TenantCatalog, TenantEntry};
use super::config::SqliteBackendConfig;
use super::schema;
use super::scope::{AttachMode, CancelSignal, TenantScope, TenantSession};

struct Inner {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    strategy: NamespaceStrategy,
    catalog: TenantCatalog,
}

/// Multi-tenant SQLite storage.
///
/// Cloning is cheap; clones share the pool and the tenant catalog.
#[derive(Clone)]
pub struct SqliteBackend {
    inner: Arc<Inner>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.inner.config)
            .field("tenants", &self.inner.catalog.len())
            .finish_non_exhaustive()
    }
}

/// Snapshot of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub connections: u32,
    pub idle_connections: u32,
}

fn set_wal(conn: &Connection, schema: DatabaseName<'_>) -> StorageResult<()> {
    let mode: String =
        conn.pragma_update_and_check(Some(schema), "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode = %mode, "database did not switch to WAL journal mode");
    }
    Ok(())
}

impl SqliteBackend {
    /// Opens the backend rooted at `config.data_dir`, creating the directory
    /// and tenant catalog if they do not exist.
    pub fn open(config: SqliteBackendConfig) -> StorageResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let strategy = NamespaceStrategy::new(config.namespace.clone()).map_err(|e| {
            StorageError::internal(format!("invalid namespace pattern: {e}"))
        })?;

        let busy_timeout = config.busy_timeout();
        let manager = SqliteConnectionManager::file(config.catalog_path()).with_init(move |c| {
            c.busy_timeout(busy_timeout)?;
            c.pragma_update(None, "foreign_keys", true)?;
            register_functions(c)
        });

        let min_idle = config.effective_min_idle();
        if min_idle < config.min_idle {
            tracing::warn!(
                min_idle = config.min_idle,
                max_connections = config.max_connections,
                "min_idle exceeds max_connections, clamping"
            );
        }

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(min_idle))
            .connection_timeout(config.acquire_timeout())
            .build(manager)
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: BACKEND_NAME.to_string(),
                    message: format!("failed to build connection pool: {e}"),
                    source: Some(Box::new(e)),
                })
            })?;

        let catalog = {
            let conn = pool.get()?;
            if config.enable_wal {
                set_wal(&conn, DatabaseName::Main)?;
            }
            TenantCatalog::open(&conn, &config.data_dir)?
        };

        tracing::info!(
            data_dir = %config.data_dir.display(),
            max_connections = config.max_connections,
            tenants = catalog.len(),
            "opened sqlite backend"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                config,
                strategy,
                catalog,
            }),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.inner.config
    }

    /// Returns the namespace naming strategy.
    pub fn namespace_strategy(&self) -> &NamespaceStrategy {
        &self.inner.strategy
    }

    /// Current pool usage.
    pub fn pool_state(&self) -> PoolState {
        let state = self.inner.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Creates the namespace for `tenant_id` and registers it in the catalog.
    ///
    /// Provisioning an existing tenant re-applies the namespace schema and
    /// returns its namespace. Fails with
    /// [`TenantError::NamespaceConflict`] if another tenant already owns the
    /// derived namespace.
    pub fn provision_tenant(&self, tenant_id: &TenantId) -> StorageResult<Namespace> {
        let namespace = self.inner.strategy.namespace_for(tenant_id)?;
        let conn = self.inner.pool.get()?;

        let (entry, is_new) = match self.inner.catalog.resolve(&conn, tenant_id)? {
            Some(entry) => (entry, false),
            None => {
                if let Some(owner) = self.inner.catalog.owner_of(&conn, &namespace)? {
                    tracing::warn!(
                        tenant = %tenant_id,
                        owner = %owner,
                        namespace = %namespace,
                        "namespace already provisioned for another tenant"
                    );
                    return Err(TenantError::NamespaceConflict {
                        tenant_id: tenant_id.clone(),
                        namespace: namespace.to_string(),
                    }
                    .into());
                }
                (self.inner.catalog.new_entry(tenant_id, namespace), true)
            }
        };

        {
            let scope = TenantScope::bind(conn, &entry, AttachMode::Create, None)?;
            let session = scope.session();
            if self.inner.config.enable_wal {
                set_wal(
                    session.connection(),
                    DatabaseName::Attached(entry.namespace.as_str()),
                )?;
            }
            schema::initialize_namespace(&session)?;
            if is_new {
                self.inner.catalog.insert(session.connection(), &entry)?;
            }
        }

        if is_new {
            tracing::info!(
                tenant = %tenant_id,
                namespace = %entry.namespace,
                "provisioned tenant"
            );
        } else {
            tracing::debug!(tenant = %tenant_id, "tenant already provisioned");
        }
        Ok(entry.namespace)
    }

    /// Removes a tenant from the catalog and deletes its database files.
    pub fn deprovision_tenant(&self, tenant_id: &TenantId) -> StorageResult<()> {
        let entry = {
            let conn = self.inner.pool.get()?;
            self.inner.catalog.remove(&conn, tenant_id)?
        }
        .ok_or_else(|| TenantError::TenantNotFound {
            tenant_id: tenant_id.clone(),
        })?;

        remove_database_files(&entry.db_path)?;
        tracing::info!(
            tenant = %tenant_id,
            namespace = %entry.namespace,
            "deprovisioned tenant"
        );
        Ok(())
    }

    /// All provisioned tenants, ordered by tenant id.
    pub fn list_tenants(&self) -> StorageResult<Vec<TenantEntry>> {
        let conn = self.inner.pool.get()?;
        self.inner.catalog.list(&conn)
    }

    /// Runs `op` on a pooled connection bound to the caller's tenant.
    ///
    /// The connection is acquired within the context's acquisition timeout
    /// (or the configured default), bound to the tenant's namespace, and
    /// returned to the pool in a neutral state however `op` finishes. Fails
    /// with [`TenantError::TenantNotFound`] for unprovisioned tenants and
    /// [`BackendError::ConnectionAcquisitionFailed`] when no connection is
    /// available in time.
    ///
    /// Dropping the returned future interrupts the running statement; the
    /// connection is still released.
    pub async fn with_tenant<T, F>(&self, ctx: &TenantContext, op: F) -> StorageResult<T>
    where
        F: FnOnce(&TenantSession<'_>) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let span = tracing::debug_span!(
            "with_tenant",
            tenant = %ctx.tenant_id(),
            correlation_id = ctx.correlation_id().unwrap_or_default()
        );

        let inner = Arc::clone(&self.inner);
        let tenant_id = ctx.tenant_id().clone();
        let timeout = ctx
            .acquire_timeout()
            .unwrap_or_else(|| inner.config.acquire_timeout());
        let signal = CancelSignal::new();
        let mut guard = signal.cancel_on_drop();
        let task_span = span.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let _entered = task_span.enter();
            let conn = inner.pool.get_timeout(timeout).map_err(|e| {
                tracing::warn!(error = %e, "connection acquisition failed");
                StorageError::Backend(BackendError::ConnectionAcquisitionFailed {
                    backend_name: BACKEND_NAME.to_string(),
                    message: e.to_string(),
                })
            })?;
            let entry = inner
                .catalog
                .resolve(&conn, &tenant_id)?
                .ok_or(TenantError::TenantNotFound { tenant_id })?;
            let scope = TenantScope::bind(conn, &entry, AttachMode::Existing, Some(&signal))
                .inspect_err(|e| {
                    if e.is_tenant_not_found() {
                        inner.catalog.evict(&entry.tenant_id);
                    }
                })?;
            op(&scope.session())
        });

        let joined = handle.instrument(span).await;
        guard.disarm();

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
            Err(e) => Err(StorageError::internal(format!(
                "tenant operation task failed: {e}"
            ))),
        }
    }
}

fn remove_database_files(db_path: &Path) -> StorageResult<()> {
    let mut paths = vec![db_path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        paths.push(name.into());
    }
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(dir: &Path) -> SqliteBackend {
        SqliteBackend::open(SqliteBackendConfig::new(dir).with_max_connections(2)).unwrap()
    }

    #[test]
    fn test_open_creates_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let backend = backend(&data_dir);
        assert!(data_dir.join("catalog.db").exists());
        assert!(backend.list_tenants().unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_unusable_config_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        for config in [
            SqliteBackendConfig::new(dir.path()).with_max_connections(0),
            SqliteBackendConfig {
                acquire_timeout_ms: 0,
                ..SqliteBackendConfig::new(dir.path())
            },
        ] {
            let err = SqliteBackend::open(config).unwrap_err();
            assert!(
                matches!(err, StorageError::Backend(BackendError::InvalidConfiguration { .. })),
                "got {err:?}"
            );
        }
        assert!(!dir.path().join("catalog.db").exists());

        let oversized_idle = SqliteBackendConfig {
            min_idle: 20,
            ..SqliteBackendConfig::new(dir.path()).with_max_connections(2)
        };
        let backend = SqliteBackend::open(oversized_idle).unwrap();
        assert!(backend.pool_state().connections <= 2);
    }

    #[test]
    fn test_provision_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        let tenant = TenantId::new("acme");

        let first = backend.provision_tenant(&tenant).unwrap();
        let second = backend.provision_tenant(&tenant).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "tenant_acme");
        assert!(dir.path().join("tenant_acme.db").exists());
        assert_eq!(backend.list_tenants().unwrap().len(), 1);
    }

    #[test]
    fn test_provision_rejects_namespace_collision() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        backend.provision_tenant(&TenantId::new("acme-east")).unwrap();

        let err = backend
            .provision_tenant(&TenantId::new("acme_east"))
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Tenant(TenantError::NamespaceConflict { .. })
        ));
    }

    #[test]
    fn test_provision_rejects_blank_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        let err = backend.provision_tenant(&TenantId::new("  ")).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Tenant(TenantError::InvalidTenant { .. })
        ));
    }

    #[test]
    fn test_deprovision_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        let tenant = TenantId::new("gone");
        backend.provision_tenant(&tenant).unwrap();

        backend.deprovision_tenant(&tenant).unwrap();
        assert!(!dir.path().join("tenant_gone.db").exists());
        assert!(backend.list_tenants().unwrap().is_empty());

        let err = backend.deprovision_tenant(&tenant).unwrap_err();
        assert!(err.is_tenant_not_found());
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        backend(dir.path())
            .provision_tenant(&TenantId::new("ta"))
            .unwrap();

        let reopened = backend(dir.path());
        let tenants = reopened.list_tenants().unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].tenant_id, TenantId::new("ta"));
    }

    #[tokio::test]
    async fn test_with_tenant_sees_namespace_schema() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        backend.provision_tenant(&TenantId::new("ta")).unwrap();

        let version = backend
            .with_tenant(&TenantContext::new("ta"), |session| {
                schema::schema_version(session)
            })
            .await
            .unwrap();
        assert_eq!(version, Some(schema::SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_with_tenant_unknown_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());

        let err = backend
            .with_tenant(&TenantContext::new("nobody"), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(err.is_tenant_not_found());
    }
}
