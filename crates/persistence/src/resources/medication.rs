use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{Predicate, SearchFilter, params};

/// A drug product, identified by a coded concept (usually RxNorm).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Medication {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub code_system: Option<String>,
    pub code_code: String,
    pub code_display: Option<String>,
    pub status: String,
    pub form_code: Option<String>,
    pub manufacturer_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum MedicationFilter {
    Code(String),
    Status(String),
    Form(String),
    Manufacturer(Uuid),
}

impl SearchFilter for MedicationFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "code" => params::token(key, value).map(Self::Code),
            "status" => params::token(key, value).map(Self::Status),
            "form" => params::token(key, value).map(Self::Form),
            "manufacturer" => params::uuid(key, value).map(Self::Manufacturer),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Form(form) => Predicate::eq("form_code", form.as_str()),
            Self::Manufacturer(id) => Predicate::eq("manufacturer_id", *id),
        }
    }
}

impl Resource for Medication {
    const RESOURCE_TYPE: &'static str = "Medication";
    const TABLE: &'static str = "medications";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.medications (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    code_system TEXT,
    code_code TEXT NOT NULL,
    code_display TEXT,
    status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'entered-in-error')),
    form_code TEXT,
    manufacturer_id TEXT REFERENCES organizations (id)
);
CREATE INDEX IF NOT EXISTS {ns}.idx_medications_code ON medications (code_code);
CREATE INDEX IF NOT EXISTS {ns}.idx_medications_status ON medications (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_medications_manufacturer ON medications (manufacturer_id);
";

    type Filter = MedicationFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("code_system", self.code_system.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("code_display", self.code_display.to_sql_value()),
            ("status", self.status.to_sql_value()),
            ("form_code", self.form_code.to_sql_value()),
            ("manufacturer_id", self.manufacturer_id.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            code_system: column(row, "code_system")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            status: column(row, "status")?,
            form_code: column(row, "form_code")?,
            manufacturer_id: column(row, "manufacturer_id")?,
        })
    }
}

pub type MedicationRepository = Repository<Medication>;
