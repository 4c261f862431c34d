//! Queries over the terminology code tables of a namespace.

use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params_from_iter};

use crate::error::{StorageError, StorageResult};
use crate::search::{FOLD_FUNCTION, escape_like, fold_case, like_pattern};
use crate::terminology::TerminologyCode;

use super::crud::placeholders;
use super::scope::TenantSession;

/// Free-text search over `T::SEARCH_COLUMNS`.
///
/// Rows whose code equals `text` come first, then rows whose code starts
/// with it, then everything else in insertion order. Blank text returns the
/// first `limit` rows in insertion order.
pub(crate) fn search_codes<T: TerminologyCode>(
    session: &TenantSession<'_>,
    text: &str,
    limit: u32,
) -> StorageResult<Vec<T>> {
    let classify = |e| StorageError::from_sqlite(e, T::SYSTEM);
    let table = session.table(T::TABLE);
    let needle = text.trim();

    let (sql, params) = if needle.is_empty() {
        (
            format!("SELECT * FROM {table} ORDER BY rowid LIMIT ?1"),
            vec![Value::Integer(i64::from(limit))],
        )
    } else {
        let matches = T::SEARCH_COLUMNS
            .iter()
            .map(|column| format!("{FOLD_FUNCTION}({column}) LIKE ?1 ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let code = T::CODE_COLUMN;
        (
            format!(
                "SELECT * FROM {table} WHERE {matches} \
                 ORDER BY CASE WHEN {FOLD_FUNCTION}({code}) = ?2 THEN 0 \
                 WHEN {FOLD_FUNCTION}({code}) LIKE ?3 ESCAPE '\\' THEN 1 ELSE 2 END, rowid \
                 LIMIT ?4"
            ),
            vec![
                Value::Text(like_pattern(needle)),
                Value::Text(fold_case(needle)),
                Value::Text(format!("{}%", escape_like(needle))),
                Value::Integer(i64::from(limit)),
            ],
        )
    };

    let mut stmt = session.connection().prepare(&sql).map_err(classify)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), T::from_row)
        .map_err(classify)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(classify)?;
    Ok(rows)
}

/// Exact lookup by code.
pub(crate) fn get_code<T: TerminologyCode>(
    session: &TenantSession<'_>,
    code: &str,
) -> StorageResult<T> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ?1",
        session.table(T::TABLE),
        T::CODE_COLUMN
    );
    session
        .connection()
        .query_row(&sql, [code], T::from_row)
        .optional()
        .map_err(|e| StorageError::from_sqlite(e, T::SYSTEM))?
        .ok_or_else(|| StorageError::not_found(T::SYSTEM, code))
}

/// Inserts or replaces `records` by code in one transaction.
///
/// A replaced row keeps its position in insertion order.
pub(crate) fn upsert_codes<T: TerminologyCode>(
    session: &TenantSession<'_>,
    records: &[T],
) -> StorageResult<usize> {
    let classify = |e| StorageError::from_sqlite(e, T::SYSTEM);
    let Some(first) = records.first() else {
        return Ok(0);
    };
    let names: Vec<&str> = first.columns().into_iter().map(|(name, _)| name).collect();
    let updates = names
        .iter()
        .filter(|name| **name != T::CODE_COLUMN)
        .map(|name| format!("{name} = excluded.{name}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {updates}",
        session.table(T::TABLE),
        names.join(", "),
        placeholders(names.len()),
        T::CODE_COLUMN
    );

    let tx = session.connection().unchecked_transaction().map_err(classify)?;
    {
        let mut stmt = tx.prepare(&sql).map_err(classify)?;
        for record in records {
            let values: Vec<Value> = record.columns().into_iter().map(|(_, v)| v).collect();
            stmt.execute(params_from_iter(values.iter()))
                .map_err(classify)?;
        }
    }
    tx.commit().map_err(classify)?;

    tracing::debug!(
        system = T::SYSTEM,
        count = records.len(),
        namespace = %session.namespace(),
        "imported terminology codes"
    );
    Ok(records.len())
}
