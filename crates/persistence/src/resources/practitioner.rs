use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{Predicate, SearchFilter, params};

/// A clinician or other care provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Practitioner {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub family_name: String,
    pub given_name: Option<String>,
    pub npi: Option<String>,
    pub specialty: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub enum PractitionerFilter {
    Name(String),
    Identifier(String),
    Specialty(String),
    Active(bool),
}

impl SearchFilter for PractitionerFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "name" => params::token(key, value).map(Self::Name),
            "identifier" => params::token(key, value).map(Self::Identifier),
            "specialty" => params::token(key, value).map(Self::Specialty),
            "active" => params::boolean(key, value).map(Self::Active),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Name(name) => Predicate::text(&["family_name", "given_name"], name.as_str()),
            Self::Identifier(npi) => Predicate::eq("npi", npi.as_str()),
            Self::Specialty(specialty) => Predicate::eq("specialty", specialty.as_str()),
            Self::Active(active) => Predicate::eq("active", *active),
        }
    }
}

impl Resource for Practitioner {
    const RESOURCE_TYPE: &'static str = "Practitioner";
    const TABLE: &'static str = "practitioners";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.practitioners (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    family_name TEXT NOT NULL,
    given_name TEXT,
    npi TEXT,
    specialty TEXT,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS {ns}.idx_practitioners_npi ON practitioners (npi);
";

    type Filter = PractitionerFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("family_name", self.family_name.to_sql_value()),
            ("given_name", self.given_name.to_sql_value()),
            ("npi", self.npi.to_sql_value()),
            ("specialty", self.specialty.to_sql_value()),
            ("active", self.active.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            family_name: column(row, "family_name")?,
            given_name: column(row, "given_name")?,
            npi: column(row, "npi")?,
            specialty: column(row, "specialty")?,
            active: column(row, "active")?,
        })
    }
}

pub type PractitionerRepository = Repository<Practitioner>;
