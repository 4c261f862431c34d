use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{Predicate, SearchFilter, params};

/// A payer, provider group, manufacturer or other organization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Organization {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub org_type: Option<String>,
    pub npi: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub enum OrganizationFilter {
    Name(String),
    Type(String),
    Identifier(String),
    Active(bool),
}

impl SearchFilter for OrganizationFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "name" => params::token(key, value).map(Self::Name),
            "type" => params::token(key, value).map(Self::Type),
            "identifier" => params::token(key, value).map(Self::Identifier),
            "active" => params::boolean(key, value).map(Self::Active),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Name(name) => Predicate::text(&["name"], name.as_str()),
            Self::Type(org_type) => Predicate::eq("org_type", org_type.as_str()),
            Self::Identifier(npi) => Predicate::eq("npi", npi.as_str()),
            Self::Active(active) => Predicate::eq("active", *active),
        }
    }
}

impl Resource for Organization {
    const RESOURCE_TYPE: &'static str = "Organization";
    const TABLE: &'static str = "organizations";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.organizations (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    name TEXT NOT NULL,
    org_type TEXT,
    npi TEXT,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS {ns}.idx_organizations_npi ON organizations (npi);
";

    type Filter = OrganizationFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", self.name.to_sql_value()),
            ("org_type", self.org_type.to_sql_value()),
            ("npi", self.npi.to_sql_value()),
            ("active", self.active.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            name: column(row, "name")?,
            org_type: column(row, "org_type")?,
            npi: column(row, "npi")?,
            active: column(row, "active")?,
        })
    }
}

pub type OrganizationRepository = Repository<Organization>;
