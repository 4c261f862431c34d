//! Connection scope: binding a pooled connection to one tenant namespace.
//!
//! A [`TenantScope`] owns a pooled connection for the duration of one
//! operation. Binding attaches the tenant's database under its namespace
//! name; dropping the scope rolls back any open transaction, detaches the
//! namespace and returns the connection to the pool. Because unbinding lives
//! in `Drop`, it runs on success, on error, during a panic unwind, and after
//! a cancelled statement.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode, InterruptHandle};

use crate::error::{BACKEND_NAME, BackendError, StorageError, StorageResult, TenantError};
use crate::tenant::{Namespace, TenantId, escape_identifier};

use super::catalog::TenantEntry;

/// A connection bound to one tenant namespace.
///
/// Handed to operations run through
/// [`SqliteBackend::with_tenant`](super::SqliteBackend::with_tenant). Tables
/// must be addressed through [`table`](Self::table); unqualified names
/// resolve against the catalog database, never against tenant data.
#[derive(Debug, Clone, Copy)]
pub struct TenantSession<'a> {
    conn: &'a Connection,
    tenant_id: &'a TenantId,
    namespace: &'a Namespace,
}

impl<'a> TenantSession<'a> {
    /// The underlying connection.
    pub fn connection(&self) -> &'a Connection {
        self.conn
    }

    /// The tenant this session is bound to.
    pub fn tenant_id(&self) -> &'a TenantId {
        self.tenant_id
    }

    /// The bound namespace.
    pub fn namespace(&self) -> &'a Namespace {
        self.namespace
    }

    /// Fully qualified name of `table` in the bound namespace.
    pub fn table(&self, table: &str) -> String {
        self.namespace.qualify(table)
    }
}

struct CancelState {
    cancelled: AtomicBool,
    interrupt: Mutex<Option<InterruptHandle>>,
}

/// Cancellation shared between a caller's future and the blocking task
/// running its operation.
#[derive(Clone)]
pub(crate) struct CancelSignal {
    state: Arc<CancelState>,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                interrupt: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Marks the operation cancelled and aborts any running statement.
    pub(crate) fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.state.interrupt.lock().as_ref() {
            handle.interrupt();
        }
    }

    /// Makes statements on `conn` interruptible. Returns `false` if the
    /// operation was cancelled before it could start.
    fn register(&self, conn: &Connection) -> bool {
        let mut slot = self.state.interrupt.lock();
        if self.is_cancelled() {
            return false;
        }
        *slot = Some(conn.get_interrupt_handle());
        true
    }

    fn clear(&self) {
        self.state.interrupt.lock().take();
    }

    /// Returns a guard that cancels when dropped unless disarmed.
    pub(crate) fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            signal: self.clone(),
            armed: true,
        }
    }
}

/// Cancels the associated operation when the awaiting future is dropped.
pub(crate) struct CancelOnDrop {
    signal: CancelSignal,
    armed: bool,
}

impl CancelOnDrop {
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("caller dropped tenant operation, cancelling");
            self.signal.cancel();
        }
    }
}

/// How a tenant database file is opened when it is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachMode {
    /// The file must already exist. A missing file means the tenant was
    /// deprovisioned.
    Existing,
    /// The file is created if missing. Used only while provisioning.
    Create,
}

impl AttachMode {
    fn uri_mode(self) -> &'static str {
        match self {
            AttachMode::Existing => "rw",
            AttachMode::Create => "rwc",
        }
    }
}

/// Builds the `file:` URI used to attach `path`.
fn attach_uri(path: &Path, mode: AttachMode) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(raw.len() + 16);
    uri.push_str("file:");
    for c in raw.chars() {
        match c {
            '%' => uri.push_str("%25"),
            '?' => uri.push_str("%3f"),
            '#' => uri.push_str("%23"),
            _ => uri.push(c),
        }
    }
    uri.push_str("?mode=");
    uri.push_str(mode.uri_mode());
    uri
}

/// A pooled connection bound to a tenant namespace.
pub(crate) struct TenantScope {
    conn: PooledConnection<SqliteConnectionManager>,
    tenant_id: TenantId,
    namespace: Namespace,
    signal: Option<CancelSignal>,
    attached: bool,
}

impl TenantScope {
    /// Resets `conn`, then attaches the tenant's database.
    ///
    /// With [`AttachMode::Existing`], a missing database file fails with
    /// [`TenantError::TenantNotFound`] and nothing is created.
    pub(crate) fn bind(
        conn: PooledConnection<SqliteConnectionManager>,
        entry: &TenantEntry,
        mode: AttachMode,
        signal: Option<&CancelSignal>,
    ) -> StorageResult<Self> {
        if let Err(e) = reset_connection(&conn) {
            tracing::error!(tenant = %entry.tenant_id, error = %e, "failed to reset pooled connection");
            return Err(e);
        }

        let mut scope = Self {
            conn,
            tenant_id: entry.tenant_id.clone(),
            namespace: entry.namespace.clone(),
            signal: None,
            attached: false,
        };

        if let Some(signal) = signal {
            if !signal.register(&scope.conn) {
                return Err(StorageError::Backend(
                    BackendError::ConnectionAcquisitionFailed {
                        backend_name: BACKEND_NAME.to_string(),
                        message: "operation cancelled before it started".to_string(),
                    },
                ));
            }
            scope.signal = Some(signal.clone());
        }

        scope
            .conn
            .execute(
                &format!("ATTACH DATABASE ?1 AS {}", scope.namespace.quoted()),
                [attach_uri(&entry.db_path, mode)],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::CannotOpen) if mode == AttachMode::Existing => {
                    tracing::warn!(
                        tenant = %entry.tenant_id,
                        path = %entry.db_path.display(),
                        "tenant database is missing"
                    );
                    StorageError::Tenant(TenantError::TenantNotFound {
                        tenant_id: entry.tenant_id.clone(),
                    })
                }
                _ => StorageError::from_sqlite(e, "Namespace"),
            })?;
        scope.attached = true;

        tracing::debug!(
            tenant = %scope.tenant_id,
            namespace = %scope.namespace,
            "bound connection to tenant namespace"
        );
        Ok(scope)
    }

    pub(crate) fn session(&self) -> TenantSession<'_> {
        TenantSession {
            conn: &self.conn,
            tenant_id: &self.tenant_id,
            namespace: &self.namespace,
        }
    }

    fn unbind(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.clear();
        }

        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(tenant = %self.tenant_id, error = %e, "rollback on unbind failed");
            }
        }
        self.conn.flush_prepared_statement_cache();

        if self.attached {
            let detach = format!("DETACH DATABASE {}", self.namespace.quoted());
            match self.conn.execute_batch(&detach) {
                Ok(()) => self.attached = false,
                Err(e) => tracing::warn!(
                    tenant = %self.tenant_id,
                    namespace = %self.namespace,
                    error = %e,
                    "detach failed; connection will be reset on next checkout"
                ),
            }
        }

        tracing::debug!(
            tenant = %self.tenant_id,
            namespace = %self.namespace,
            "released tenant connection"
        );
    }
}

impl Drop for TenantScope {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// Returns a checked-out connection to its neutral state: autocommit mode
/// with only the catalog attached.
pub(crate) fn reset_connection(conn: &Connection) -> StorageResult<()> {
    if !conn.is_autocommit() {
        tracing::warn!("connection checked out inside a transaction, rolling back");
        conn.execute_batch("ROLLBACK")?;
    }

    for name in attached_databases(conn)? {
        tracing::warn!(namespace = %name, "detaching stray namespace from pooled connection");
        conn.execute_batch(&format!("DETACH DATABASE {}", escape_identifier(&name)))?;
    }
    Ok(())
}

/// Names of attached databases other than `main` and `temp`.
pub fn attached_databases(conn: &Connection) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA database_list")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names
        .into_iter()
        .filter(|name| name != "main" && name != "temp")
        .collect())
}
