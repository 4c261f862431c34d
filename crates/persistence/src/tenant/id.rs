//! Tenant identifier type.
//!
//! This module defines the [`TenantId`] type, an opaque identifier for the
//! organization that owns a set of records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TenantError;

/// An opaque tenant identifier.
///
/// Tenant ids are compared exactly. Mapping an id onto its storage namespace
/// is the job of [`NamespaceStrategy`](super::NamespaceStrategy); two ids that
/// normalize to the same namespace cannot both be provisioned.
///
/// # Examples
///
/// ```
/// use cdr_persistence::tenant::TenantId;
///
/// let tenant = TenantId::new("st-mary/oncology");
/// assert_eq!(tenant.as_str(), "st-mary/oncology");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID from the given string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rejects blank identifiers.
    pub fn validate(&self) -> Result<(), TenantError> {
        if self.0.trim().is_empty() {
            return Err(TenantError::InvalidTenant {
                tenant_id: self.clone(),
                reason: "tenant id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TenantId::new(s))
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_creation() {
        let tenant = TenantId::new("clinic-a");
        assert_eq!(tenant.as_str(), "clinic-a");
        assert_eq!(tenant.to_string(), "clinic-a");
        assert_eq!(format!("{tenant:?}"), "TenantId(clinic-a)");
    }

    #[test]
    fn test_blank_tenant_rejected() {
        assert!(TenantId::new("").validate().is_err());
        assert!(TenantId::new("   ").validate().is_err());
        assert!(TenantId::new("ta").validate().is_ok());
    }

    #[test]
    fn test_serde_roundtrip() {
        let tenant = TenantId::new("acme/research");
        let json = serde_json::to_string(&tenant).unwrap();
        assert_eq!(json, "\"acme/research\"");

        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tenant);
    }

    #[test]
    fn test_from_string() {
        let tenant: TenantId = "clinic-a".into();
        let tenant2: TenantId = String::from("clinic-a").into();
        assert_eq!(tenant, tenant2);
    }
}
