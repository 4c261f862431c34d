//! Tenant catalog.
//!
//! The catalog lives in the pool's `main` database and records which
//! namespace, and which database file, belongs to each provisioned tenant.
//! Lookups are served from an in-process cache and fall back to the catalog
//! table on a miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::core::sql::{SqlField, column};
use crate::error::StorageResult;
use crate::tenant::{Namespace, TenantId};

const CATALOG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS main.tenants (
    tenant_id TEXT PRIMARY KEY,
    namespace TEXT NOT NULL UNIQUE,
    db_file TEXT NOT NULL,
    provisioned_at TEXT NOT NULL
);
";

/// A provisioned tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantEntry {
    pub tenant_id: TenantId,
    pub namespace: Namespace,
    pub db_path: PathBuf,
    pub provisioned_at: DateTime<Utc>,
}

impl TenantEntry {
    fn from_row(row: &Row<'_>, data_dir: &Path) -> rusqlite::Result<Self> {
        let tenant_id: String = column(row, "tenant_id")?;
        let namespace: String = column(row, "namespace")?;
        let db_file: String = column(row, "db_file")?;
        Ok(Self {
            tenant_id: TenantId::new(tenant_id),
            namespace: Namespace::from_trusted(namespace),
            db_path: data_dir.join(db_file),
            provisioned_at: column(row, "provisioned_at")?,
        })
    }
}

pub(crate) struct TenantCatalog {
    data_dir: PathBuf,
    cache: RwLock<HashMap<TenantId, TenantEntry>>,
}

impl TenantCatalog {
    /// Creates the catalog table if needed and loads every entry.
    pub(crate) fn open(conn: &Connection, data_dir: &Path) -> StorageResult<Self> {
        conn.execute_batch(CATALOG_SCHEMA)?;
        let catalog = Self {
            data_dir: data_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        };
        let entries = catalog.list(conn)?;
        catalog
            .cache
            .write()
            .extend(entries.into_iter().map(|e| (e.tenant_id.clone(), e)));
        Ok(catalog)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub(crate) fn cached(&self, tenant_id: &TenantId) -> Option<TenantEntry> {
        self.cache.read().get(tenant_id).cloned()
    }

    /// Drops a cached entry whose database has gone away.
    pub(crate) fn evict(&self, tenant_id: &TenantId) {
        self.cache.write().remove(tenant_id);
    }

    /// Resolves a tenant, consulting the catalog table on a cache miss.
    pub(crate) fn resolve(
        &self,
        conn: &Connection,
        tenant_id: &TenantId,
    ) -> StorageResult<Option<TenantEntry>> {
        if let Some(entry) = self.cached(tenant_id) {
            return Ok(Some(entry));
        }
        let entry = conn
            .query_row(
                "SELECT * FROM main.tenants WHERE tenant_id = ?1",
                [tenant_id.as_str()],
                |row| TenantEntry::from_row(row, &self.data_dir),
            )
            .optional()?;
        if let Some(entry) = &entry {
            self.cache
                .write()
                .insert(entry.tenant_id.clone(), entry.clone());
        }
        Ok(entry)
    }

    /// Returns the tenant that owns `namespace`, if any.
    pub(crate) fn owner_of(
        &self,
        conn: &Connection,
        namespace: &Namespace,
    ) -> StorageResult<Option<TenantId>> {
        let owner: Option<String> = conn
            .query_row(
                "SELECT tenant_id FROM main.tenants WHERE namespace = ?1",
                [namespace.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner.map(TenantId::new))
    }

    /// Builds the entry a new tenant would receive.
    pub(crate) fn new_entry(&self, tenant_id: &TenantId, namespace: Namespace) -> TenantEntry {
        TenantEntry {
            tenant_id: tenant_id.clone(),
            db_path: self.data_dir.join(namespace.db_file_name()),
            namespace,
            provisioned_at: Utc::now(),
        }
    }

    pub(crate) fn insert(&self, conn: &Connection, entry: &TenantEntry) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO main.tenants (tenant_id, namespace, db_file, provisioned_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.tenant_id.as_str(),
                entry.namespace.as_str(),
                entry.namespace.db_file_name(),
                entry.provisioned_at.to_sql_value(),
            ],
        )
        .map_err(|e| crate::error::StorageError::from_sqlite(e, "Tenant"))?;
        self.cache
            .write()
            .insert(entry.tenant_id.clone(), entry.clone());
        Ok(())
    }

    pub(crate) fn remove(
        &self,
        conn: &Connection,
        tenant_id: &TenantId,
    ) -> StorageResult<Option<TenantEntry>> {
        let entry = self.resolve(conn, tenant_id)?;
        if entry.is_some() {
            conn.execute(
                "DELETE FROM main.tenants WHERE tenant_id = ?1",
                [tenant_id.as_str()],
            )?;
        }
        self.cache.write().remove(tenant_id);
        Ok(entry)
    }

    pub(crate) fn list(&self, conn: &Connection) -> StorageResult<Vec<TenantEntry>> {
        let mut stmt = conn.prepare("SELECT * FROM main.tenants ORDER BY tenant_id")?;
        let entries = stmt
            .query_map([], |row| TenantEntry::from_row(row, &self.data_dir))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_resolve_remove() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("catalog.db")).unwrap();
        let catalog = TenantCatalog::open(&conn, dir.path()).unwrap();
        let tenant = TenantId::new("ta");

        let entry = catalog.new_entry(&tenant, Namespace::from_trusted("tenant_ta"));
        assert_eq!(entry.db_path, dir.path().join("tenant_ta.db"));
        catalog.insert(&conn, &entry).unwrap();

        assert_eq!(
            catalog.owner_of(&conn, &entry.namespace).unwrap(),
            Some(tenant.clone())
        );

        let reopened = TenantCatalog::open(&conn, dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.resolve(&conn, &tenant).unwrap(), Some(entry.clone()));

        assert_eq!(reopened.remove(&conn, &tenant).unwrap(), Some(entry));
        assert_eq!(reopened.resolve(&conn, &tenant).unwrap(), None);
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("catalog.db")).unwrap();
        let catalog = TenantCatalog::open(&conn, dir.path()).unwrap();

        let ns = Namespace::from_trusted("tenant_acme");
        catalog
            .insert(&conn, &catalog.new_entry(&TenantId::new("acme"), ns.clone()))
            .unwrap();
        let err = catalog
            .insert(&conn, &catalog.new_entry(&TenantId::new("ACME"), ns))
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
