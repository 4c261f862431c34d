//! Multi-tenant support.
//!
//! All storage operations are tenant-scoped. A [`TenantContext`] names the
//! tenant; the backend resolves it to a [`Namespace`] through its catalog and
//! binds a pooled connection to that namespace for exactly one operation.
//!
//! # Naming
//!
//! [`NamespaceStrategy`] derives namespace names from tenant ids
//! (`Acme/Research` becomes `tenant_acme_research`). The mapping is lossy, so
//! provisioning refuses a second tenant id that lands on a namespace already
//! in use.

mod context;
mod id;
mod namespace;

pub use context::TenantContext;
pub use id::TenantId;
pub use namespace::{Namespace, NamespaceConfig, NamespaceStrategy};

pub(crate) use namespace::escape_identifier;
