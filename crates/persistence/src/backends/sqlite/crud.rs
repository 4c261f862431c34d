//! Row-level operations shared by every resource repository.
//!
//! Each function runs against a [`TenantSession`] and addresses tables only
//! through namespace-qualified names. Multi-statement operations run in a
//! single transaction on the session's connection.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use crate::core::identity::{FhirIdAllocator, MAX_ALLOCATION_ATTEMPTS, is_valid_fhir_id};
use crate::core::sql::{SqlField, format_instant};
use crate::core::{ChildRecord, Resource, ResourceMeta};
use crate::error::{ConcurrencyError, IntegrityError, StorageError, StorageResult};
use crate::search::{Page, Predicate, SearchTranslator};

use super::scope::TenantSession;

const LEDGER_TABLE: &str = "fhir_id_ledger";

pub(super) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reserves a never-before-used external id in the namespace ledger.
fn reserve_fhir_id(
    conn: &Connection,
    session: &TenantSession<'_>,
    allocator: &dyn FhirIdAllocator,
    resource_type: &str,
    now: &DateTime<Utc>,
) -> StorageResult<String> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} (fhir_id, resource_type, allocated_at) VALUES (?1, ?2, ?3)",
        session.table(LEDGER_TABLE)
    );
    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        let candidate = allocator.candidate(resource_type);
        if !is_valid_fhir_id(&candidate) {
            return Err(StorageError::internal(format!(
                "allocator produced an invalid external id: {candidate:?}"
            )));
        }
        let inserted = conn
            .execute(&sql, params![candidate, resource_type, format_instant(now)])
            .map_err(|e| StorageError::from_sqlite(e, resource_type))?;
        if inserted == 1 {
            return Ok(candidate);
        }
        tracing::debug!(resource_type, attempt, "external id already allocated, retrying");
    }
    Err(StorageError::Integrity(IntegrityError::ConstraintViolation {
        resource_type: resource_type.to_string(),
        message: format!(
            "could not allocate an unused external id after {MAX_ALLOCATION_ATTEMPTS} attempts"
        ),
    }))
}

/// Inserts `record`, assigning fresh internal and external identities.
///
/// `record` is only modified once the row is committed.
pub(crate) fn insert<R: Resource>(
    session: &TenantSession<'_>,
    allocator: &dyn FhirIdAllocator,
    record: &mut R,
) -> StorageResult<()> {
    let classify = |e| StorageError::from_sqlite(e, R::RESOURCE_TYPE);
    let tx = session.connection().unchecked_transaction().map_err(classify)?;
    let now = Utc::now();

    let fhir_id = reserve_fhir_id(&tx, session, allocator, R::RESOURCE_TYPE, &now)?;
    let mut staged = record.clone();
    staged.meta_mut().assign(Uuid::new_v4(), fhir_id, now);

    let mut names: Vec<&str> = ResourceMeta::COLUMNS.to_vec();
    let mut values: Vec<Value> = staged.meta().values().to_vec();
    for (name, value) in staged.columns() {
        names.push(name);
        values.push(value);
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        session.table(R::TABLE),
        names.join(", "),
        placeholders(values.len())
    );
    tx.execute(&sql, params_from_iter(values.iter()))
        .map_err(classify)?;
    tx.commit().map_err(classify)?;

    tracing::debug!(
        resource_type = R::RESOURCE_TYPE,
        id = %staged.meta().id,
        fhir_id = %staged.meta().fhir_id,
        "created resource"
    );
    *record = staged;
    Ok(())
}

fn select_one<R: Resource>(
    conn: &Connection,
    session: &TenantSession<'_>,
    column: &str,
    value: Value,
) -> StorageResult<Option<R>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {column} = ?1",
        session.table(R::TABLE)
    );
    conn.query_row(&sql, [value], R::from_row)
        .optional()
        .map_err(|e| StorageError::from_sqlite(e, R::RESOURCE_TYPE))
}

/// Looks a resource up by internal id.
pub(crate) fn get_by_id<R: Resource>(session: &TenantSession<'_>, id: Uuid) -> StorageResult<R> {
    select_one(session.connection(), session, "id", id.to_sql_value())?
        .ok_or_else(|| StorageError::not_found(R::RESOURCE_TYPE, id))
}

/// Looks a resource up by external id.
pub(crate) fn get_by_fhir_id<R: Resource>(
    session: &TenantSession<'_>,
    fhir_id: &str,
) -> StorageResult<R> {
    select_one(session.connection(), session, "fhir_id", fhir_id.to_sql_value())?
        .ok_or_else(|| StorageError::not_found(R::RESOURCE_TYPE, fhir_id))
}

/// Overwrites every mutable column of `record`.
///
/// With `expected_updated_at`, the write only happens if the stored row was
/// last modified at exactly that instant. On success `record` is replaced by
/// the stored row, so identities and `created_at` are authoritative.
pub(crate) fn update<R: Resource>(
    session: &TenantSession<'_>,
    record: &mut R,
    expected_updated_at: Option<DateTime<Utc>>,
) -> StorageResult<()> {
    let classify = |e| StorageError::from_sqlite(e, R::RESOURCE_TYPE);
    let id = record.meta().id;
    let tx = session.connection().unchecked_transaction().map_err(classify)?;

    let mut assignments = Vec::new();
    let mut values = Vec::new();
    for (name, value) in record.columns() {
        values.push(value);
        assignments.push(format!("{name} = ?{}", values.len()));
    }
    values.push(Utc::now().to_sql_value());
    assignments.push(format!("updated_at = ?{}", values.len()));
    values.push(id.to_sql_value());

    let mut sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        session.table(R::TABLE),
        assignments.join(", "),
        values.len()
    );
    if let Some(expected) = expected_updated_at {
        values.push(expected.to_sql_value());
        sql.push_str(&format!(" AND updated_at = ?{}", values.len()));
    }

    let changed = tx
        .execute(&sql, params_from_iter(values.iter()))
        .map_err(classify)?;
    if changed == 0 {
        let exists = select_one::<R>(&tx, session, "id", id.to_sql_value())?.is_some();
        return Err(if exists && expected_updated_at.is_some() {
            StorageError::Concurrency(ConcurrencyError::VersionConflict {
                resource_type: R::RESOURCE_TYPE.to_string(),
                id: id.to_string(),
            })
        } else {
            StorageError::not_found(R::RESOURCE_TYPE, id)
        });
    }

    let stored = select_one::<R>(&tx, session, "id", id.to_sql_value())?
        .ok_or_else(|| StorageError::not_found(R::RESOURCE_TYPE, id))?;
    tx.commit().map_err(classify)?;

    tracing::debug!(resource_type = R::RESOURCE_TYPE, id = %id, "updated resource");
    *record = stored;
    Ok(())
}

/// Hard-deletes a resource; owned children go with it.
pub(crate) fn delete<R: Resource>(session: &TenantSession<'_>, id: Uuid) -> StorageResult<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", session.table(R::TABLE));
    let changed = session
        .connection()
        .execute(&sql, [id.to_sql_value()])
        .map_err(|e| StorageError::from_sqlite(e, R::RESOURCE_TYPE))?;
    if changed == 0 {
        return Err(StorageError::not_found(R::RESOURCE_TYPE, id));
    }
    tracing::debug!(resource_type = R::RESOURCE_TYPE, id = %id, "deleted resource");
    Ok(())
}

/// Counts and pages the rows matching `predicates`, in insertion order.
///
/// The count and the page are read from the same snapshot.
pub(crate) fn search<R: Resource>(
    session: &TenantSession<'_>,
    predicates: &[Predicate],
    limit: u32,
    offset: u32,
) -> StorageResult<Page<R>> {
    let classify = |e| StorageError::from_sqlite(e, R::RESOURCE_TYPE);
    let table = session.table(R::TABLE);
    let filter = SearchTranslator::where_clause(predicates);
    let tx = session.connection().unchecked_transaction().map_err(classify)?;

    let count_sql = format!("SELECT COUNT(*) FROM {table} {}", filter.sql);
    let total: i64 = tx
        .query_row(&count_sql, params_from_iter(filter.params.iter()), |row| {
            row.get(0)
        })
        .map_err(classify)?;

    let limit_param = filter.params.len() + 1;
    let page_sql = format!(
        "SELECT * FROM {table} {} ORDER BY rowid LIMIT ?{} OFFSET ?{}",
        filter.sql,
        limit_param,
        limit_param + 1
    );
    let mut params = filter.params;
    params.push(Value::Integer(i64::from(limit)));
    params.push(Value::Integer(i64::from(offset)));

    let items = {
        let mut stmt = tx.prepare(&page_sql).map_err(classify)?;
        stmt.query_map(params_from_iter(params.iter()), R::from_row)
            .map_err(classify)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?
    };
    tx.commit().map_err(classify)?;

    Ok(Page {
        items,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

/// Inserts a child record under its parent, assigning a fresh id.
pub(crate) fn insert_child<C: ChildRecord>(
    session: &TenantSession<'_>,
    child: &mut C,
) -> StorageResult<()> {
    let mut staged = child.clone();
    staged.set_id(Uuid::new_v4());

    let mut names = vec!["id"];
    let mut values = vec![staged.id().to_sql_value()];
    for (name, value) in staged.columns() {
        names.push(name);
        values.push(value);
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        session.table(C::TABLE),
        names.join(", "),
        placeholders(values.len())
    );
    session
        .connection()
        .execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| StorageError::from_sqlite(e, C::RECORD_TYPE))?;

    tracing::debug!(
        record_type = C::RECORD_TYPE,
        parent = %staged.parent_id(),
        "added child record"
    );
    *child = staged;
    Ok(())
}

/// Returns the children of `parent_id` in their declared order.
pub(crate) fn select_children<C: ChildRecord>(
    session: &TenantSession<'_>,
    parent_id: Uuid,
) -> StorageResult<Vec<C>> {
    let classify = |e| StorageError::from_sqlite(e, C::RECORD_TYPE);
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ?1 ORDER BY {}",
        session.table(C::TABLE),
        C::PARENT_COLUMN,
        C::ORDER_BY
    );
    let mut stmt = session.connection().prepare(&sql).map_err(classify)?;
    let children = stmt
        .query_map([parent_id.to_sql_value()], C::from_row)
        .map_err(classify)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(classify)?;
    Ok(children)
}
