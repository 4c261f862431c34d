//! Naming systems and the unique identifiers they are known by.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{ChildRecord, Repository, Resource, ResourceMeta};
use crate::error::{StorageResult, ValidationError};
use crate::search::{Predicate, SearchFilter, params};
use crate::tenant::TenantContext;

/// A code system or identifier namespace managed within a tenant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NamingSystem {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub name: String,
    /// One of `codesystem`, `identifier`, `root`.
    pub kind: String,
    pub date: DateTime<Utc>,
    pub publisher: Option<String>,
    pub responsible: Option<String>,
    pub type_code: Option<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
}

/// An identifier (OID, URI, ...) for a [`NamingSystem`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NamingSystemUniqueId {
    pub id: Uuid,
    pub naming_system_id: Uuid,
    /// One of `oid`, `uuid`, `uri`, `other`.
    pub id_type: String,
    pub value: String,
    pub preferred: bool,
    pub comment: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum NamingSystemFilter {
    Name(String),
    Status(String),
    Kind(String),
    Publisher(String),
    Type(String),
}

impl SearchFilter for NamingSystemFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "name" => params::token(key, value).map(Self::Name),
            "status" => params::token(key, value).map(Self::Status),
            "kind" => params::token(key, value).map(Self::Kind),
            "publisher" => params::token(key, value).map(Self::Publisher),
            "type" => params::token(key, value).map(Self::Type),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Name(name) => Predicate::text(&["name"], name.as_str()),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Kind(kind) => Predicate::eq("kind", kind.as_str()),
            Self::Publisher(publisher) => Predicate::text(&["publisher"], publisher.as_str()),
            Self::Type(type_code) => Predicate::eq("type_code", type_code.as_str()),
        }
    }
}

impl Resource for NamingSystem {
    const RESOURCE_TYPE: &'static str = "NamingSystem";
    const TABLE: &'static str = "naming_systems";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.naming_systems (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'active', 'retired', 'unknown')),
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('codesystem', 'identifier', 'root')),
    date TEXT NOT NULL,
    publisher TEXT,
    responsible TEXT,
    type_code TEXT,
    description TEXT,
    usage TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_naming_systems_status ON naming_systems (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_naming_systems_name ON naming_systems (name);
";

    type Filter = NamingSystemFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("name", self.name.to_sql_value()),
            ("kind", self.kind.to_sql_value()),
            ("date", self.date.to_sql_value()),
            ("publisher", self.publisher.to_sql_value()),
            ("responsible", self.responsible.to_sql_value()),
            ("type_code", self.type_code.to_sql_value()),
            ("description", self.description.to_sql_value()),
            ("usage", self.usage.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            name: column(row, "name")?,
            kind: column(row, "kind")?,
            date: column(row, "date")?,
            publisher: column(row, "publisher")?,
            responsible: column(row, "responsible")?,
            type_code: column(row, "type_code")?,
            description: column(row, "description")?,
            usage: column(row, "usage")?,
        })
    }
}

impl ChildRecord for NamingSystemUniqueId {
    type Parent = NamingSystem;

    const RECORD_TYPE: &'static str = "NamingSystemUniqueId";
    const TABLE: &'static str = "naming_system_unique_ids";
    const PARENT_COLUMN: &'static str = "naming_system_id";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.naming_system_unique_ids (
    id TEXT PRIMARY KEY,
    naming_system_id TEXT NOT NULL REFERENCES naming_systems (id) ON DELETE CASCADE,
    id_type TEXT NOT NULL CHECK (id_type IN ('oid', 'uuid', 'uri', 'other')),
    value TEXT NOT NULL,
    preferred INTEGER NOT NULL DEFAULT 0,
    comment TEXT,
    period_start TEXT,
    period_end TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_naming_system_unique_ids_parent
    ON naming_system_unique_ids (naming_system_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_naming_system_unique_ids_value
    ON naming_system_unique_ids (value);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.naming_system_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("naming_system_id", self.naming_system_id.to_sql_value()),
            ("id_type", self.id_type.to_sql_value()),
            ("value", self.value.to_sql_value()),
            ("preferred", self.preferred.to_sql_value()),
            ("comment", self.comment.to_sql_value()),
            ("period_start", self.period_start.to_sql_value()),
            ("period_end", self.period_end.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            naming_system_id: column(row, "naming_system_id")?,
            id_type: column(row, "id_type")?,
            value: column(row, "value")?,
            preferred: column(row, "preferred")?,
            comment: column(row, "comment")?,
            period_start: column(row, "period_start")?,
            period_end: column(row, "period_end")?,
        })
    }
}

pub type NamingSystemRepository = Repository<NamingSystem>;

impl Repository<NamingSystem> {
    pub async fn add_unique_id(
        &self,
        ctx: &TenantContext,
        unique_id: NamingSystemUniqueId,
    ) -> StorageResult<NamingSystemUniqueId> {
        self.add_child(ctx, unique_id).await
    }

    pub async fn get_unique_ids(
        &self,
        ctx: &TenantContext,
        naming_system_id: Uuid,
    ) -> StorageResult<Vec<NamingSystemUniqueId>> {
        self.get_children(ctx, naming_system_id).await
    }
}
