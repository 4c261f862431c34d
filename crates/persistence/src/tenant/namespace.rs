//! Tenant namespaces.
//!
//! Each tenant's records live in a dedicated namespace: a separate SQLite
//! database file that is attached to a pooled connection under the namespace
//! name for the duration of one operation. Every statement addresses tables
//! through [`Namespace::qualify`], so no statement ever depends on which
//! databases happen to be attached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TenantError;

use super::TenantId;

/// Configuration for deriving namespaces from tenant ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Prefix for namespace names. The full name is `{prefix}{tenant_id}`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Maximum namespace length.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Pattern every derived namespace must match.
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_prefix() -> String {
    "tenant_".to_string()
}

fn default_max_length() -> usize {
    63
}

fn default_pattern() -> String {
    r"^[a-z][a-z0-9_]*$".to_string()
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            max_length: default_max_length(),
            pattern: default_pattern(),
        }
    }
}

impl NamespaceConfig {
    /// Sets the namespace prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// A validated namespace name.
///
/// Only [`NamespaceStrategy`] and the tenant catalog construct these, so the
/// contained name always matches the configured identifier pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub(crate) fn from_trusted(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the bare namespace name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace as a quoted SQL identifier.
    pub fn quoted(&self) -> String {
        escape_identifier(&self.0)
    }

    /// Returns a fully qualified reference to `table` inside this namespace.
    ///
    /// ```
    /// # use cdr_persistence::tenant::{NamespaceStrategy, TenantId};
    /// let strategy = NamespaceStrategy::default();
    /// let ns = strategy.namespace_for(&TenantId::new("ta")).unwrap();
    /// assert_eq!(ns.qualify("flags"), "\"tenant_ta\".\"flags\"");
    /// ```
    pub fn qualify(&self, table: &str) -> String {
        format!("{}.{}", self.quoted(), escape_identifier(table))
    }

    /// File name of the database backing this namespace.
    pub fn db_file_name(&self) -> String {
        format!("{}.db", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps tenant ids onto namespace names.
///
/// Tenant IDs are converted to namespace names by:
/// - Converting to lowercase
/// - Replacing `/` and `-` with underscores
/// - Dropping any other character outside `[a-z0-9_]`
/// - Prefixing with the configured prefix (default: `tenant_`)
#[derive(Debug, Clone)]
pub struct NamespaceStrategy {
    config: NamespaceConfig,
    pattern: regex::Regex,
}

impl NamespaceStrategy {
    /// Creates a strategy with the given configuration.
    pub fn new(config: NamespaceConfig) -> Result<Self, regex::Error> {
        let pattern = regex::Regex::new(&config.pattern)?;
        Ok(Self { config, pattern })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    /// Derives and validates the namespace for a tenant.
    pub fn namespace_for(&self, tenant_id: &TenantId) -> Result<Namespace, TenantError> {
        tenant_id.validate()?;

        let normalized = normalize_tenant_id(tenant_id.as_str());
        if normalized.is_empty() {
            return Err(TenantError::InvalidTenant {
                tenant_id: tenant_id.clone(),
                reason: "tenant id contains no usable characters".to_string(),
            });
        }

        let name = format!("{}{}", self.config.prefix, normalized);
        if name.len() > self.config.max_length {
            return Err(TenantError::InvalidTenant {
                tenant_id: tenant_id.clone(),
                reason: format!(
                    "namespace exceeds maximum length of {} characters",
                    self.config.max_length
                ),
            });
        }
        if !self.pattern.is_match(&name) {
            return Err(TenantError::InvalidTenant {
                tenant_id: tenant_id.clone(),
                reason: format!(
                    "namespace '{}' does not match required pattern: {}",
                    name, self.config.pattern
                ),
            });
        }

        Ok(Namespace(name))
    }
}

impl Default for NamespaceStrategy {
    fn default() -> Self {
        let config = NamespaceConfig::default();
        let pattern = regex::Regex::new(&config.pattern).unwrap_or_else(|_| {
            unreachable!("default namespace pattern is a valid regex")
        });
        Self { config, pattern }
    }
}

fn normalize_tenant_id(id: &str) -> String {
    id.to_lowercase()
        .replace(['/', '-'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

pub(crate) fn escape_identifier(id: &str) -> String {
    format!("\"{}\"", id.replace('"', "\"\""))
}
