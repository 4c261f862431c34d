//! Tenant context for storage operations.
//!
//! Every repository call takes a [`TenantContext`]. There is no way to reach
//! a table without naming the tenant that owns it.

use std::time::Duration;

use super::id::TenantId;

/// The per-call context for storage operations.
///
/// Besides the tenant identity it carries request-scoped knobs: an optional
/// correlation id that is attached to log events, and an optional deadline
/// for acquiring a pooled connection. Cancellation is expressed by dropping
/// the future returned by the operation.
///
/// ```
/// use std::time::Duration;
/// use cdr_persistence::tenant::{TenantContext, TenantId};
///
/// let ctx = TenantContext::new(TenantId::new("clinic-a"))
///     .with_correlation_id("req-42")
///     .with_acquire_timeout(Duration::from_millis(250));
/// assert_eq!(ctx.correlation_id(), Some("req-42"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    correlation_id: Option<String>,
    acquire_timeout: Option<Duration>,
}

impl TenantContext {
    /// Creates a new context for the given tenant.
    pub fn new(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            correlation_id: None,
            acquire_timeout: None,
        }
    }

    /// Creates a context with the specified correlation ID for tracing.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Overrides the backend's connection acquisition timeout for this call.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Returns the tenant ID.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the correlation ID, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the acquisition timeout override, if set.
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout
    }
}

impl From<TenantId> for TenantContext {
    fn from(tenant_id: TenantId) -> Self {
        Self::new(tenant_id)
    }
}
