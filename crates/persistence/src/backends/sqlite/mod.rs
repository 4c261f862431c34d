//! SQLite backend.
//!
//! One SQLite database file per tenant namespace, plus a catalog database
//! that maps tenant ids to namespaces. Pooled connections open the catalog;
//! each operation attaches exactly one tenant database under its namespace
//! name for its duration.
//!
//! # Example
//!
//! ```no_run
//! use cdr_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
//! use cdr_persistence::tenant::{TenantContext, TenantId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open(SqliteBackendConfig::new("./data"))?;
//! backend.provision_tenant(&TenantId::new("clinic-a"))?;
//!
//! let ctx = TenantContext::new("clinic-a");
//! let tables = backend
//!     .with_tenant(&ctx, |session| Ok(session.table("flags")))
//!     .await?;
//! assert_eq!(tables, "\"tenant_clinic_a\".\"flags\"");
//! # Ok(())
//! # }
//! ```

mod backend;
mod catalog;
mod config;
pub(crate) mod crud;
pub(crate) mod lookup;
mod schema;
mod scope;

pub use backend::{PoolState, SqliteBackend};
pub use catalog::TenantEntry;
pub use config::SqliteBackendConfig;
pub use schema::{SCHEMA_VERSION, schema_version};
pub use scope::{TenantSession, attached_databases};
