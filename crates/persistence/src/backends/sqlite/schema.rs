//! Namespace schema.
//!
//! Every tenant namespace holds the same set of tables: one per resource
//! type, one per owned child record, one per terminology code system, and
//! the external id ledger. DDL templates use `{ns}` for the quoted
//! namespace name and are applied idempotently.

use rusqlite::OptionalExtension;

use crate::error::{StorageError, StorageResult};

use super::scope::TenantSession;

/// Current namespace schema version.
pub const SCHEMA_VERSION: i64 = 1;

const LEDGER_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS {ns}.fhir_id_ledger (
    fhir_id TEXT PRIMARY KEY,
    resource_type TEXT NOT NULL,
    allocated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {ns}.schema_version (
    version INTEGER NOT NULL
);
";

/// Substitutes the namespace into a DDL template.
pub(crate) fn render(template: &str, session: &TenantSession<'_>) -> String {
    template.replace("{ns}", &session.namespace().quoted())
}

/// All DDL templates, in creation order.
pub(crate) fn namespace_templates() -> impl Iterator<Item = &'static str> {
    std::iter::once(LEDGER_SCHEMA)
        .chain(crate::resources::SCHEMAS.iter().copied())
        .chain(crate::terminology::SCHEMAS.iter().copied())
}

/// Creates or completes the namespace schema bound to `session`.
pub(crate) fn initialize_namespace(session: &TenantSession<'_>) -> StorageResult<()> {
    let conn = session.connection();
    let tx = conn.unchecked_transaction()?;
    for template in namespace_templates() {
        tx.execute_batch(&render(template, session)).map_err(|e| {
            StorageError::internal(format!(
                "failed to create schema in {}: {e}",
                session.namespace()
            ))
        })?;
    }

    let version_table = session.table("schema_version");
    let current: Option<i64> = tx
        .query_row(&format!("SELECT version FROM {version_table}"), [], |row| {
            row.get(0)
        })
        .optional()?;
    match current {
        None => {
            tx.execute(
                &format!("INSERT INTO {version_table} (version) VALUES (?1)"),
                [SCHEMA_VERSION],
            )?;
        }
        Some(version) if version > SCHEMA_VERSION => {
            return Err(StorageError::internal(format!(
                "namespace {} has schema version {version}, newer than supported {SCHEMA_VERSION}",
                session.namespace()
            )));
        }
        Some(_) => {}
    }
    tx.commit()?;
    Ok(())
}

/// Reads the schema version of the bound namespace.
pub fn schema_version(session: &TenantSession<'_>) -> StorageResult<Option<i64>> {
    let sql = format!("SELECT version FROM {}", session.table("schema_version"));
    Ok(session
        .connection()
        .query_row(&sql, [], |row| row.get(0))
        .optional()?)
}
