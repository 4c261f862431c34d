use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A clinical condition, problem or diagnosis recorded for a patient.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    pub category_code: Option<String>,
    pub severity_code: Option<String>,
    pub code_system: Option<String>,
    pub code_code: String,
    pub code_display: Option<String>,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub onset_at: Option<DateTime<Utc>>,
    pub abatement_at: Option<DateTime<Utc>>,
    pub recorded_date: Option<DateTime<Utc>>,
    pub recorder_practitioner_id: Option<Uuid>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ConditionFilter {
    Patient(Uuid),
    ClinicalStatus(String),
    VerificationStatus(String),
    Category(String),
    Severity(String),
    Code(String),
    Encounter(Uuid),
    OnsetDate(DateParam),
}

impl SearchFilter for ConditionFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "clinical-status" => params::token(key, value).map(Self::ClinicalStatus),
            "verification-status" => params::token(key, value).map(Self::VerificationStatus),
            "category" => params::token(key, value).map(Self::Category),
            "severity" => params::token(key, value).map(Self::Severity),
            "code" => params::token(key, value).map(Self::Code),
            "encounter" => params::uuid(key, value).map(Self::Encounter),
            "onset-date" => params::date(key, value).map(Self::OnsetDate),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::ClinicalStatus(status) => Predicate::eq("clinical_status", status.as_str()),
            Self::VerificationStatus(status) => {
                Predicate::eq("verification_status", status.as_str())
            }
            Self::Category(code) => Predicate::eq("category_code", code.as_str()),
            Self::Severity(code) => Predicate::eq("severity_code", code.as_str()),
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Encounter(id) => Predicate::eq("encounter_id", *id),
            Self::OnsetDate(date) => Predicate::instant("onset_at", *date),
        }
    }
}

impl Resource for Condition {
    const RESOURCE_TYPE: &'static str = "Condition";
    const TABLE: &'static str = "conditions";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.conditions (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    clinical_status TEXT CHECK (clinical_status IN ('active', 'recurrence', 'relapse',
        'inactive', 'remission', 'resolved')),
    verification_status TEXT CHECK (verification_status IN ('unconfirmed', 'provisional',
        'differential', 'confirmed', 'refuted', 'entered-in-error')),
    category_code TEXT,
    severity_code TEXT,
    code_system TEXT,
    code_code TEXT NOT NULL,
    code_display TEXT,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    onset_at TEXT,
    abatement_at TEXT,
    recorded_date TEXT,
    recorder_practitioner_id TEXT REFERENCES practitioners (id),
    note TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_conditions_patient ON conditions (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_conditions_clinical_status ON conditions (clinical_status);
CREATE INDEX IF NOT EXISTS {ns}.idx_conditions_verification_status ON conditions (verification_status);
CREATE INDEX IF NOT EXISTS {ns}.idx_conditions_code ON conditions (code_code);
CREATE INDEX IF NOT EXISTS {ns}.idx_conditions_encounter ON conditions (encounter_id);
";

    type Filter = ConditionFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("clinical_status", self.clinical_status.to_sql_value()),
            ("verification_status", self.verification_status.to_sql_value()),
            ("category_code", self.category_code.to_sql_value()),
            ("severity_code", self.severity_code.to_sql_value()),
            ("code_system", self.code_system.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("code_display", self.code_display.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("onset_at", self.onset_at.to_sql_value()),
            ("abatement_at", self.abatement_at.to_sql_value()),
            ("recorded_date", self.recorded_date.to_sql_value()),
            ("recorder_practitioner_id", self.recorder_practitioner_id.to_sql_value()),
            ("note", self.note.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            clinical_status: column(row, "clinical_status")?,
            verification_status: column(row, "verification_status")?,
            category_code: column(row, "category_code")?,
            severity_code: column(row, "severity_code")?,
            code_system: column(row, "code_system")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            patient_id: column(row, "patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            onset_at: column(row, "onset_at")?,
            abatement_at: column(row, "abatement_at")?,
            recorded_date: column(row, "recorded_date")?,
            recorder_practitioner_id: column(row, "recorder_practitioner_id")?,
            note: column(row, "note")?,
        })
    }
}

pub type ConditionRepository = Repository<Condition>;
