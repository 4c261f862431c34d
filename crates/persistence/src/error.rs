//! Error types for the persistence layer.
//!
//! Errors are grouped by category: resource state, data integrity,
//! concurrency, tenancy, caller input, and backend failures. Repository
//! operations surface exactly one of these per failure; nothing is retried
//! internally.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::tenant::TenantId;

pub(crate) const BACKEND_NAME: &str = "sqlite";

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Resource state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Referential integrity and storage constraint errors
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Optimistic concurrency errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Tenant resolution and provisioning errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Caller input errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors related to resource state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// No record with the requested identity exists in the bound namespace.
    ///
    /// Records that exist in another tenant produce exactly this error.
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },
}

/// Errors raised by the storage engine's integrity checks.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// A reference field points at a record that does not exist, or a delete
    /// would orphan a record that still references the target.
    #[error("referential integrity violation on {resource_type}: {message}")]
    ReferentialIntegrityViolation {
        resource_type: String,
        message: String,
    },

    /// A uniqueness, NOT NULL, or enumeration check failed.
    #[error("constraint violation on {resource_type}: {message}")]
    ConstraintViolation {
        resource_type: String,
        message: String,
    },
}

/// Errors related to concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The record changed since the caller read it.
    #[error("version conflict: {resource_type}/{id} has been modified")]
    VersionConflict { resource_type: String, id: String },
}

/// Errors related to tenant resolution.
#[derive(Error, Debug)]
pub enum TenantError {
    /// No namespace is provisioned for the tenant.
    #[error("tenant not found: {tenant_id}")]
    TenantNotFound { tenant_id: TenantId },

    /// The tenant identifier cannot be mapped to a namespace.
    #[error("invalid tenant {tenant_id}: {reason}")]
    InvalidTenant { tenant_id: TenantId, reason: String },

    /// Another tenant already owns the derived namespace.
    #[error("namespace {namespace} for tenant {tenant_id} is already in use")]
    NamespaceConflict {
        tenant_id: TenantId,
        namespace: String,
    },
}

/// Errors caused by invalid caller input.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A recognized search key carried a value that cannot be parsed.
    #[error("invalid search parameter '{parameter}': {message}")]
    InvalidSearchParameter { parameter: String, message: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// No connection could be obtained before the deadline, or the caller
    /// cancelled while waiting.
    #[error("connection acquisition failed for {backend_name}: {message}")]
    ConnectionAcquisitionFailed {
        backend_name: String,
        message: String,
    },

    /// The backend configuration cannot be used to open a pool.
    #[error("invalid configuration for {backend_name}: {message}")]
    InvalidConfiguration {
        backend_name: String,
        message: String,
    },

    /// The running statement was aborted because the caller went away.
    #[error("operation cancelled in {backend_name}")]
    Cancelled { backend_name: String },

    /// Filesystem error while managing namespace storage.
    #[error("i/o error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Builds the not-found error for a resource type and requested identity.
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        StorageError::Resource(ResourceError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Returns `true` for [`ResourceError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Resource(ResourceError::NotFound { .. }))
    }

    /// Returns `true` for [`IntegrityError::ReferentialIntegrityViolation`].
    pub fn is_referential_integrity(&self) -> bool {
        matches!(
            self,
            StorageError::Integrity(IntegrityError::ReferentialIntegrityViolation { .. })
        )
    }

    /// Returns `true` for [`IntegrityError::ConstraintViolation`].
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Integrity(IntegrityError::ConstraintViolation { .. })
        )
    }

    /// Returns `true` for [`TenantError::TenantNotFound`].
    pub fn is_tenant_not_found(&self) -> bool {
        matches!(self, StorageError::Tenant(TenantError::TenantNotFound { .. }))
    }

    /// Returns `true` for [`BackendError::ConnectionAcquisitionFailed`].
    pub fn is_connection_acquisition_failed(&self) -> bool {
        matches!(
            self,
            StorageError::Backend(BackendError::ConnectionAcquisitionFailed { .. })
        )
    }

    /// Classifies a SQLite error raised while operating on `resource_type`.
    ///
    /// Foreign key failures become referential integrity violations, every
    /// other constraint failure becomes a constraint violation, and interrupts
    /// become cancellations.
    pub(crate) fn from_sqlite(err: rusqlite::Error, resource_type: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, message) = &err {
            let message = message.clone().unwrap_or_else(|| ffi_err.to_string());
            if ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                return StorageError::Integrity(IntegrityError::ReferentialIntegrityViolation {
                    resource_type: resource_type.to_string(),
                    message,
                });
            }
            match ffi_err.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    return StorageError::Integrity(IntegrityError::ConstraintViolation {
                        resource_type: resource_type.to_string(),
                        message,
                    });
                }
                rusqlite::ErrorCode::OperationInterrupted => {
                    return StorageError::Backend(BackendError::Cancelled {
                        backend_name: BACKEND_NAME.to_string(),
                    });
                }
                _ => {}
            }
        }
        StorageError::Backend(BackendError::Internal {
            backend_name: BACKEND_NAME.to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: BACKEND_NAME.to_string(),
            message: message.into(),
            source: None,
        })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::from_sqlite(err, "unknown")
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::ConnectionAcquisitionFailed {
            backend_name: BACKEND_NAME.to_string(),
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Backend(BackendError::Io {
            message: err.to_string(),
            source: err,
        })
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
