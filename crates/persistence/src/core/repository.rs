//! The uniform repository contract shared by every resource type.
//!
//! All operations take a [`TenantContext`] and run inside one
//! [`SqliteBackend::with_tenant`] scope, so a repository can never observe
//! rows from another tenant's namespace.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backends::sqlite::{SqliteBackend, crud};
use crate::error::StorageResult;
use crate::search::{Page, Pagination, Predicate, SearchFilter, parse_filters};
use crate::tenant::TenantContext;

use super::identity::{FhirIdAllocator, RandomFhirIdAllocator};
use super::resource::{ChildRecord, Resource};

/// CRUD and search over one resource type.
///
/// # Errors
///
/// Every operation can fail with `TenantNotFound` and
/// `ConnectionAcquisitionFailed` before touching data. Lookups and mutations
/// of a missing row fail with `NotFound`; writes that break a foreign key
/// fail with `ReferentialIntegrityViolation`, other constraint failures with
/// `ConstraintViolation`.
#[async_trait]
pub trait ResourceRepository<R: Resource>: Send + Sync {
    /// Persists a new record and returns it with fresh internal and external
    /// ids and equal `created_at`/`updated_at`.
    async fn create(&self, ctx: &TenantContext, record: R) -> StorageResult<R>;

    /// Reads a record by internal id.
    async fn get_by_id(&self, ctx: &TenantContext, id: Uuid) -> StorageResult<R>;

    /// Reads a record by external id.
    async fn get_by_fhir_id(&self, ctx: &TenantContext, fhir_id: &str) -> StorageResult<R>;

    /// Overwrites every mutable field of an existing record, returning the
    /// stored row. Identities and `created_at` never change.
    async fn update(&self, ctx: &TenantContext, record: R) -> StorageResult<R>;

    /// Permanently removes a record and its owned children.
    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> StorageResult<()>;

    /// Returns one page of records matching `filters`, plus the total match
    /// count. Unrecognized keys are ignored.
    async fn search(
        &self,
        ctx: &TenantContext,
        filters: &HashMap<String, String>,
        page: Pagination,
    ) -> StorageResult<Page<R>>;

    /// Returns one page of all records.
    async fn list(&self, ctx: &TenantContext, page: Pagination) -> StorageResult<Page<R>>;
}

/// SQLite-backed repository for resource type `R`.
pub struct Repository<R: Resource> {
    backend: SqliteBackend,
    allocator: Arc<dyn FhirIdAllocator>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            allocator: Arc::clone(&self.allocator),
            _marker: PhantomData,
        }
    }
}

impl<R: Resource> std::fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("resource_type", &R::RESOURCE_TYPE)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}

impl<R: Resource> Repository<R> {
    /// Creates a repository allocating random external ids.
    pub fn new(backend: SqliteBackend) -> Self {
        Self::with_allocator(backend, Arc::new(RandomFhirIdAllocator))
    }

    /// Creates a repository with a custom external id allocator.
    pub fn with_allocator(backend: SqliteBackend, allocator: Arc<dyn FhirIdAllocator>) -> Self {
        Self {
            backend,
            allocator,
            _marker: PhantomData,
        }
    }

    pub fn backend(&self) -> &SqliteBackend {
        &self.backend
    }

    fn resolve_page(&self, page: Pagination) -> (u32, u32) {
        let config = self.backend.config();
        let limit = page.effective_limit(config.default_page_size, config.max_page_size);
        (limit, page.offset)
    }

    /// Like [`update`](ResourceRepository::update), but only succeeds if the
    /// stored row was last modified at `record.meta().updated_at`.
    ///
    /// Fails with `VersionConflict` if another writer got there first.
    pub async fn update_if_match(&self, ctx: &TenantContext, record: R) -> StorageResult<R> {
        let expected: DateTime<Utc> = record.meta().updated_at;
        self.backend
            .with_tenant(ctx, move |session| {
                let mut record = record;
                crud::update(session, &mut record, Some(expected))?;
                Ok(record)
            })
            .await
    }

    /// Searches with already-typed filters.
    pub async fn search_with(
        &self,
        ctx: &TenantContext,
        filters: &[R::Filter],
        page: Pagination,
    ) -> StorageResult<Page<R>> {
        let predicates = filters.iter().map(|f| f.predicate()).collect();
        self.search_predicates(ctx, predicates, page).await
    }

    async fn search_predicates(
        &self,
        ctx: &TenantContext,
        predicates: Vec<Predicate>,
        page: Pagination,
    ) -> StorageResult<Page<R>> {
        let (limit, offset) = self.resolve_page(page);
        tracing::debug!(
            resource_type = R::RESOURCE_TYPE,
            filters = predicates.len(),
            limit,
            offset,
            "searching"
        );
        self.backend
            .with_tenant(ctx, move |session| {
                crud::search::<R>(session, &predicates, limit, offset)
            })
            .await
    }

    /// Adds an owned sub-record under its parent.
    ///
    /// Fails with `ReferentialIntegrityViolation` if the parent does not exist.
    pub async fn add_child<C>(&self, ctx: &TenantContext, child: C) -> StorageResult<C>
    where
        C: ChildRecord<Parent = R>,
    {
        self.backend
            .with_tenant(ctx, move |session| {
                let mut child = child;
                crud::insert_child(session, &mut child)?;
                Ok(child)
            })
            .await
    }

    /// Returns the sub-records of `parent_id` in their natural order. An
    /// unknown parent has no children.
    pub async fn get_children<C>(&self, ctx: &TenantContext, parent_id: Uuid) -> StorageResult<Vec<C>>
    where
        C: ChildRecord<Parent = R>,
    {
        self.backend
            .with_tenant(ctx, move |session| crud::select_children::<C>(session, parent_id))
            .await
    }
}

#[async_trait]
impl<R: Resource> ResourceRepository<R> for Repository<R> {
    async fn create(&self, ctx: &TenantContext, record: R) -> StorageResult<R> {
        let allocator = Arc::clone(&self.allocator);
        self.backend
            .with_tenant(ctx, move |session| {
                let mut record = record;
                crud::insert(session, allocator.as_ref(), &mut record)?;
                Ok(record)
            })
            .await
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: Uuid) -> StorageResult<R> {
        self.backend
            .with_tenant(ctx, move |session| crud::get_by_id::<R>(session, id))
            .await
    }

    async fn get_by_fhir_id(&self, ctx: &TenantContext, fhir_id: &str) -> StorageResult<R> {
        let fhir_id = fhir_id.to_string();
        self.backend
            .with_tenant(ctx, move |session| crud::get_by_fhir_id::<R>(session, &fhir_id))
            .await
    }

    async fn update(&self, ctx: &TenantContext, record: R) -> StorageResult<R> {
        self.backend
            .with_tenant(ctx, move |session| {
                let mut record = record;
                crud::update(session, &mut record, None)?;
                Ok(record)
            })
            .await
    }

    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> StorageResult<()> {
        self.backend
            .with_tenant(ctx, move |session| crud::delete::<R>(session, id))
            .await
    }

    async fn search(
        &self,
        ctx: &TenantContext,
        filters: &HashMap<String, String>,
        page: Pagination,
    ) -> StorageResult<Page<R>> {
        let predicates = parse_filters::<R::Filter>(filters)?;
        self.search_predicates(ctx, predicates, page).await
    }

    async fn list(&self, ctx: &TenantContext, page: Pagination) -> StorageResult<Page<R>> {
        self.search_with(ctx, &[], page).await
    }
}
