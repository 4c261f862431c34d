use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// An interaction between a patient and care providers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub class_code: String,
    pub patient_id: Uuid,
    pub practitioner_id: Option<Uuid>,
    pub service_provider_id: Option<Uuid>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub reason_code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EncounterFilter {
    Patient(Uuid),
    Status(String),
    Class(String),
    Practitioner(Uuid),
    Date(DateParam),
}

impl SearchFilter for EncounterFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "class" => params::token(key, value).map(Self::Class),
            "practitioner" | "participant" => params::uuid(key, value).map(Self::Practitioner),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Class(class) => Predicate::eq("class_code", class.as_str()),
            Self::Practitioner(id) => Predicate::eq("practitioner_id", *id),
            Self::Date(date) => Predicate::instant("period_start", *date),
        }
    }
}

impl Resource for Encounter {
    const RESOURCE_TYPE: &'static str = "Encounter";
    const TABLE: &'static str = "encounters";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.encounters (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('planned', 'arrived', 'triaged', 'in-progress',
        'onleave', 'finished', 'cancelled', 'entered-in-error', 'unknown')),
    class_code TEXT NOT NULL,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    practitioner_id TEXT REFERENCES practitioners (id),
    service_provider_id TEXT REFERENCES organizations (id),
    period_start TEXT,
    period_end TEXT,
    reason_code TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_encounters_patient ON encounters (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_encounters_status ON encounters (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_encounters_practitioner ON encounters (practitioner_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_encounters_provider ON encounters (service_provider_id);
";

    type Filter = EncounterFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("class_code", self.class_code.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("practitioner_id", self.practitioner_id.to_sql_value()),
            ("service_provider_id", self.service_provider_id.to_sql_value()),
            ("period_start", self.period_start.to_sql_value()),
            ("period_end", self.period_end.to_sql_value()),
            ("reason_code", self.reason_code.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            class_code: column(row, "class_code")?,
            patient_id: column(row, "patient_id")?,
            practitioner_id: column(row, "practitioner_id")?,
            service_provider_id: column(row, "service_provider_id")?,
            period_start: column(row, "period_start")?,
            period_end: column(row, "period_end")?,
            reason_code: column(row, "reason_code")?,
        })
    }
}

pub type EncounterRepository = Repository<Encounter>;
