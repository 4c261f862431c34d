//! Record shapes understood by the generic repository.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::search::SearchFilter;

use super::sql::{SqlField, column};

/// Identity and bookkeeping fields shared by every persisted resource.
///
/// `id` is the internal identity and `fhir_id` the externally visible one.
/// Both are assigned by `create` and never change afterwards. A freshly
/// constructed record carries a nil `id` and an empty `fhir_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub id: Uuid,
    pub fhir_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceMeta {
    pub(crate) const COLUMNS: [&'static str; 4] = ["id", "fhir_id", "created_at", "updated_at"];

    pub(crate) fn assign(&mut self, id: Uuid, fhir_id: String, now: DateTime<Utc>) {
        self.id = id;
        self.fhir_id = fhir_id;
        self.created_at = now;
        self.updated_at = now;
    }

    pub(crate) fn values(&self) -> [Value; 4] {
        [
            self.id.to_sql_value(),
            self.fhir_id.to_sql_value(),
            self.created_at.to_sql_value(),
            self.updated_at.to_sql_value(),
        ]
    }

    /// Reads the identity columns of a resource row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            fhir_id: column(row, "fhir_id")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    /// Returns `true` once the record has been persisted.
    pub fn is_persisted(&self) -> bool {
        !self.id.is_nil()
    }
}

impl Default for ResourceMeta {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            fhir_id: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// A top-level resource type with its own table in every tenant namespace.
///
/// Implementations list their mutable columns in [`columns`](Self::columns)
/// and read them back by name in [`from_row`](Self::from_row); the identity
/// columns from [`ResourceMeta`] are handled by the repository.
pub trait Resource: Debug + Clone + Send + Sync + 'static {
    /// FHIR resource type name, used in errors and log events.
    const RESOURCE_TYPE: &'static str;

    /// Table name inside a tenant namespace.
    const TABLE: &'static str;

    /// DDL creating the table and its indexes. `{ns}` is replaced by the
    /// quoted namespace.
    const SCHEMA: &'static str;

    /// Closed set of search keys this resource understands.
    type Filter: SearchFilter;

    fn meta(&self) -> &ResourceMeta;

    fn meta_mut(&mut self) -> &mut ResourceMeta;

    /// Mutable columns with their storage values.
    fn columns(&self) -> Vec<(&'static str, Value)>;

    /// Rebuilds a record from a `SELECT *` row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// A sub-record owned by a parent resource, such as an observation
/// component. Children are removed with their parent.
pub trait ChildRecord: Debug + Clone + Send + Sync + 'static {
    /// The owning resource type.
    type Parent: Resource;

    /// Descriptive name used in errors, e.g. `ObservationComponent`.
    const RECORD_TYPE: &'static str;

    const TABLE: &'static str;

    /// Column holding the parent's internal id.
    const PARENT_COLUMN: &'static str;

    /// Ordering applied by `get_children`.
    const ORDER_BY: &'static str = "rowid";

    /// DDL creating the table; `{ns}` is replaced by the quoted namespace.
    const SCHEMA: &'static str;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    fn parent_id(&self) -> Uuid;

    /// Columns other than `id`, including the parent column.
    fn columns(&self) -> Vec<(&'static str, Value)>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}
