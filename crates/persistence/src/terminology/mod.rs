//! Reference terminology lookup.
//!
//! Code tables (LOINC, ICD-10, SNOMED CT, RxNorm, CPT) live in every tenant
//! namespace next to the resource tables. Normal repository operations never
//! write them: [`TerminologyLookup`] is read-only, and data is loaded through
//! the separate [`TerminologyImporter`].
//!
//! # Example
//!
//! ```no_run
//! use cdr_persistence::backends::sqlite::SqliteBackend;
//! use cdr_persistence::tenant::TenantContext;
//! use cdr_persistence::terminology::{LoincCode, TerminologyLookup, TerminologyRepository};
//!
//! # async fn example(backend: SqliteBackend) -> cdr_persistence::StorageResult<()> {
//! let loinc = TerminologyRepository::<LoincCode>::new(backend);
//! let ctx = TenantContext::new("clinic-a");
//! let hits = loinc.search(&ctx, "glucose", 0).await?; // up to 20 rows
//! let code = loinc.get_by_code(&ctx, "2345-7").await?;
//! # Ok(())
//! # }
//! ```

mod codes;

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use rusqlite::Row;
use rusqlite::types::Value;

use crate::backends::sqlite::{SqliteBackend, lookup};
use crate::error::StorageResult;
use crate::search::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::tenant::TenantContext;

pub use codes::{CptCode, Icd10Code, LoincCode, RxNormConcept, SnomedConcept};

/// A record in one code system, keyed by its natural code.
pub trait TerminologyCode: Debug + Clone + Send + Sync + 'static {
    /// Code system name, used in errors and log events.
    const SYSTEM: &'static str;

    const TABLE: &'static str;

    /// Column holding the natural key.
    const CODE_COLUMN: &'static str;

    /// Columns matched by free-text search.
    const SEARCH_COLUMNS: &'static [&'static str];

    /// DDL creating the table; `{ns}` is replaced by the quoted namespace.
    const SCHEMA: &'static str;

    fn code(&self) -> &str;

    /// All columns with their storage values, code column first.
    fn columns(&self) -> Vec<(&'static str, Value)>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Read-only access to a code system.
#[async_trait]
pub trait TerminologyLookup<T: TerminologyCode>: Send + Sync {
    /// Case-insensitive substring search over the system's search columns.
    ///
    /// A `limit` of zero or less returns up to 20 rows. Exact code matches
    /// sort first, then code prefix matches, then insertion order.
    async fn search(&self, ctx: &TenantContext, text: &str, limit: i64) -> StorageResult<Vec<T>>;

    /// Exact code lookup. Fails with `NotFound` if the code is absent.
    async fn get_by_code(&self, ctx: &TenantContext, code: &str) -> StorageResult<T>;
}

/// Resolves a caller-supplied search limit.
pub(crate) fn effective_limit(limit: i64) -> u32 {
    if limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        u32::try_from(limit).unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }
}

/// SQLite-backed lookup for code system `T`.
pub struct TerminologyRepository<T: TerminologyCode> {
    backend: SqliteBackend,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TerminologyCode> Clone for TerminologyRepository<T> {
    fn clone(&self) -> Self {
        Self::new(self.backend.clone())
    }
}

impl<T: TerminologyCode> Debug for TerminologyRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminologyRepository")
            .field("system", &T::SYSTEM)
            .finish_non_exhaustive()
    }
}

impl<T: TerminologyCode> TerminologyRepository<T> {
    pub fn new(backend: SqliteBackend) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TerminologyCode> TerminologyLookup<T> for TerminologyRepository<T> {
    async fn search(&self, ctx: &TenantContext, text: &str, limit: i64) -> StorageResult<Vec<T>> {
        let limit = effective_limit(limit);
        let text = text.to_string();
        self.backend
            .with_tenant(ctx, move |session| lookup::search_codes(session, &text, limit))
            .await
    }

    async fn get_by_code(&self, ctx: &TenantContext, code: &str) -> StorageResult<T> {
        let code = code.to_string();
        self.backend
            .with_tenant(ctx, move |session| lookup::get_code(session, &code))
            .await
    }
}

/// Bulk loader for code system `T`.
pub struct TerminologyImporter<T: TerminologyCode> {
    backend: SqliteBackend,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TerminologyCode> Debug for TerminologyImporter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminologyImporter")
            .field("system", &T::SYSTEM)
            .finish_non_exhaustive()
    }
}

impl<T: TerminologyCode> TerminologyImporter<T> {
    pub fn new(backend: SqliteBackend) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    /// Inserts `records`, replacing existing rows with the same code.
    /// All records are written in one transaction; returns how many.
    pub async fn import(&self, ctx: &TenantContext, records: Vec<T>) -> StorageResult<usize> {
        self.backend
            .with_tenant(ctx, move |session| lookup::upsert_codes(session, &records))
            .await
    }
}

pub type LoincRepository = TerminologyRepository<LoincCode>;
pub type Icd10Repository = TerminologyRepository<Icd10Code>;
pub type SnomedRepository = TerminologyRepository<SnomedConcept>;
pub type RxNormRepository = TerminologyRepository<RxNormConcept>;
pub type CptRepository = TerminologyRepository<CptCode>;

pub(crate) const SCHEMAS: &[&str] = &[
    LoincCode::SCHEMA,
    Icd10Code::SCHEMA,
    SnomedConcept::SCHEMA,
    RxNormConcept::SCHEMA,
    CptCode::SCHEMA,
];
