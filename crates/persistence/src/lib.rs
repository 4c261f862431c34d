//! Clinical Data Repository Persistence Layer
//!
//! This crate stores clinical, financial and administrative records for many
//! tenants, each isolated in its own SQLite namespace. Every resource type is
//! exposed through the same repository contract and carries two identities:
//! an internal UUID and a separate external (FHIR) id.
//!
//! # Architecture
//!
//! - [`tenant`] - Tenant ids, contexts and namespace naming
//! - [`backends`] - The SQLite backend: connection pool, tenant catalog, and
//!   the `with_tenant` scope that binds one connection to one namespace
//! - [`core`] - The [`ResourceRepository`] contract and external id allocation
//! - [`resources`] - Concrete resource types and their filters
//! - [`search`] - Filter parsing, parameterized SQL translation, pagination
//! - [`terminology`] - Read-only LOINC, ICD-10, SNOMED CT, RxNorm and CPT lookup
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use cdr_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
//! use cdr_persistence::resources::{Flag, FlagRepository, Patient, PatientRepository};
//! use cdr_persistence::search::Pagination;
//! use cdr_persistence::tenant::{TenantContext, TenantId};
//! use cdr_persistence::ResourceRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open(SqliteBackendConfig::new("./data"))?;
//! backend.provision_tenant(&TenantId::new("clinic-a"))?;
//! let ctx = TenantContext::new("clinic-a");
//!
//! let patients = PatientRepository::new(backend.clone());
//! let patient = patients
//!     .create(&ctx, Patient { family_name: "Smith".into(), ..Default::default() })
//!     .await?;
//!
//! let flags = FlagRepository::new(backend);
//! let flag = flags
//!     .create(
//!         &ctx,
//!         Flag {
//!             status: "active".into(),
//!             code_code: "SAFETY-001".into(),
//!             subject_patient_id: patient.meta.id,
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//!
//! let filters = HashMap::from([("patient".to_string(), patient.meta.id.to_string())]);
//! let page = flags.search(&ctx, &filters, Pagination::default()).await?;
//! assert_eq!(page.total, 1);
//! assert_eq!(page.items[0].meta.fhir_id, flag.meta.fhir_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Multitenancy
//!
//! All operations take a [`TenantContext`](tenant::TenantContext). A tenant
//! must be provisioned before use; operations for unknown tenants fail with
//! `TenantNotFound` and never touch a namespace.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod resources;
pub mod search;
pub mod tenant;
pub mod terminology;

pub use crate::core::{ChildRecord, Repository, Resource, ResourceMeta, ResourceRepository};
pub use backends::sqlite::{SqliteBackend, SqliteBackendConfig};
pub use error::{StorageError, StorageResult};
pub use search::{Page, Pagination};
pub use tenant::{TenantContext, TenantId};
pub use terminology::{TerminologyImporter, TerminologyLookup, TerminologyRepository};
