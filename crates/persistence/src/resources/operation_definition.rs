//! Operation definitions and their declared parameters.

use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{ChildRecord, Repository, Resource, ResourceMeta};
use crate::error::{StorageResult, ValidationError};
use crate::search::{Predicate, SearchFilter, params};
use crate::tenant::TenantContext;

/// A named operation or query supported by the repository's API surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationDefinition {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub url: Option<String>,
    pub version: Option<String>,
    pub name: String,
    pub title: Option<String>,
    pub status: String,
    /// Either `operation` or `query`.
    pub kind: String,
    pub code: String,
    pub system_level: bool,
    pub type_level: bool,
    pub instance_level: bool,
    /// Comma-separated resource types the operation applies to.
    pub resource_types: Option<String>,
    pub affects_state: Option<bool>,
    pub description: Option<String>,
}

/// One input or output parameter. Returned ordered by `sequence`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationParameter {
    pub id: Uuid,
    pub operation_definition_id: Uuid,
    pub name: String,
    /// Either `in` or `out`.
    pub param_use: String,
    pub min: i64,
    /// A cardinality such as `1` or `*`.
    pub max: String,
    pub param_type: Option<String>,
    pub documentation: Option<String>,
    pub sequence: i64,
}

#[derive(Debug, Clone)]
pub enum OperationDefinitionFilter {
    Url(String),
    Name(String),
    Status(String),
    Code(String),
    Kind(String),
    System(bool),
    Type(bool),
    Instance(bool),
}

impl SearchFilter for OperationDefinitionFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "url" => params::token(key, value).map(Self::Url),
            "name" => params::token(key, value).map(Self::Name),
            "status" => params::token(key, value).map(Self::Status),
            "code" => params::token(key, value).map(Self::Code),
            "kind" => params::token(key, value).map(Self::Kind),
            "system" => params::boolean(key, value).map(Self::System),
            "type" => params::boolean(key, value).map(Self::Type),
            "instance" => params::boolean(key, value).map(Self::Instance),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Url(url) => Predicate::eq("url", url.as_str()),
            Self::Name(name) => Predicate::text(&["name"], name.as_str()),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Code(code) => Predicate::eq("code", code.as_str()),
            Self::Kind(kind) => Predicate::eq("kind", kind.as_str()),
            Self::System(flag) => Predicate::eq("system_level", *flag),
            Self::Type(flag) => Predicate::eq("type_level", *flag),
            Self::Instance(flag) => Predicate::eq("instance_level", *flag),
        }
    }
}

impl Resource for OperationDefinition {
    const RESOURCE_TYPE: &'static str = "OperationDefinition";
    const TABLE: &'static str = "operation_definitions";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.operation_definitions (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    url TEXT,
    version TEXT,
    name TEXT NOT NULL,
    title TEXT,
    status TEXT NOT NULL CHECK (status IN ('draft', 'active', 'retired', 'unknown')),
    kind TEXT NOT NULL CHECK (kind IN ('operation', 'query')),
    code TEXT NOT NULL,
    system_level INTEGER NOT NULL DEFAULT 0,
    type_level INTEGER NOT NULL DEFAULT 0,
    instance_level INTEGER NOT NULL DEFAULT 0,
    resource_types TEXT,
    affects_state INTEGER,
    description TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_operation_definitions_status ON operation_definitions (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_operation_definitions_code ON operation_definitions (code);
CREATE INDEX IF NOT EXISTS {ns}.idx_operation_definitions_url ON operation_definitions (url);
";

    type Filter = OperationDefinitionFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("url", self.url.to_sql_value()),
            ("version", self.version.to_sql_value()),
            ("name", self.name.to_sql_value()),
            ("title", self.title.to_sql_value()),
            ("status", self.status.to_sql_value()),
            ("kind", self.kind.to_sql_value()),
            ("code", self.code.to_sql_value()),
            ("system_level", self.system_level.to_sql_value()),
            ("type_level", self.type_level.to_sql_value()),
            ("instance_level", self.instance_level.to_sql_value()),
            ("resource_types", self.resource_types.to_sql_value()),
            ("affects_state", self.affects_state.to_sql_value()),
            ("description", self.description.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            url: column(row, "url")?,
            version: column(row, "version")?,
            name: column(row, "name")?,
            title: column(row, "title")?,
            status: column(row, "status")?,
            kind: column(row, "kind")?,
            code: column(row, "code")?,
            system_level: column(row, "system_level")?,
            type_level: column(row, "type_level")?,
            instance_level: column(row, "instance_level")?,
            resource_types: column(row, "resource_types")?,
            affects_state: column(row, "affects_state")?,
            description: column(row, "description")?,
        })
    }
}

impl ChildRecord for OperationParameter {
    type Parent = OperationDefinition;

    const RECORD_TYPE: &'static str = "OperationParameter";
    const TABLE: &'static str = "operation_parameters";
    const PARENT_COLUMN: &'static str = "operation_definition_id";
    const ORDER_BY: &'static str = "sequence, rowid";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.operation_parameters (
    id TEXT PRIMARY KEY,
    operation_definition_id TEXT NOT NULL
        REFERENCES operation_definitions (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    param_use TEXT NOT NULL CHECK (param_use IN ('in', 'out')),
    min INTEGER NOT NULL CHECK (min >= 0),
    max TEXT NOT NULL,
    param_type TEXT,
    documentation TEXT,
    sequence INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS {ns}.idx_operation_parameters_parent
    ON operation_parameters (operation_definition_id, sequence);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.operation_definition_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("operation_definition_id", self.operation_definition_id.to_sql_value()),
            ("name", self.name.to_sql_value()),
            ("param_use", self.param_use.to_sql_value()),
            ("min", self.min.to_sql_value()),
            ("max", self.max.to_sql_value()),
            ("param_type", self.param_type.to_sql_value()),
            ("documentation", self.documentation.to_sql_value()),
            ("sequence", self.sequence.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            operation_definition_id: column(row, "operation_definition_id")?,
            name: column(row, "name")?,
            param_use: column(row, "param_use")?,
            min: column(row, "min")?,
            max: column(row, "max")?,
            param_type: column(row, "param_type")?,
            documentation: column(row, "documentation")?,
            sequence: column(row, "sequence")?,
        })
    }
}

pub type OperationDefinitionRepository = Repository<OperationDefinition>;

impl Repository<OperationDefinition> {
    pub async fn add_parameter(
        &self,
        ctx: &TenantContext,
        parameter: OperationParameter,
    ) -> StorageResult<OperationParameter> {
        self.add_child(ctx, parameter).await
    }

    /// Parameters of an operation, ordered by sequence.
    pub async fn get_parameters(
        &self,
        ctx: &TenantContext,
        operation_definition_id: Uuid,
    ) -> StorageResult<Vec<OperationParameter>> {
        self.get_children(ctx, operation_definition_id).await
    }
}
