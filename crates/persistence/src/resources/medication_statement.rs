use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A record of a medication being taken, reported by the patient or a
/// clinician.
///
/// The medication is either a reference to a stored [`Medication`] or an
/// inline code; both may be present.
///
/// [`Medication`]: super::Medication
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MedicationStatement {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub category_code: Option<String>,
    pub medication_id: Option<Uuid>,
    pub medication_code: Option<String>,
    pub medication_display: Option<String>,
    pub patient_id: Uuid,
    pub context_encounter_id: Option<Uuid>,
    pub effective_start: Option<DateTime<Utc>>,
    pub effective_end: Option<DateTime<Utc>>,
    pub date_asserted: Option<DateTime<Utc>>,
    pub information_source_practitioner_id: Option<Uuid>,
    pub reason_code: Option<String>,
    pub dosage_text: Option<String>,
    pub dose_quantity: Option<f64>,
    pub dose_unit: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub enum MedicationStatementFilter {
    Patient(Uuid),
    Status(String),
    Category(String),
    Medication(Uuid),
    Code(String),
    Context(Uuid),
    Effective(DateParam),
}

impl SearchFilter for MedicationStatementFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "category" => params::token(key, value).map(Self::Category),
            "medication" => params::uuid(key, value).map(Self::Medication),
            "code" => params::token(key, value).map(Self::Code),
            "context" => params::uuid(key, value).map(Self::Context),
            "effective" => params::date(key, value).map(Self::Effective),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Category(code) => Predicate::eq("category_code", code.as_str()),
            Self::Medication(id) => Predicate::eq("medication_id", *id),
            Self::Code(code) => Predicate::eq("medication_code", code.as_str()),
            Self::Context(id) => Predicate::eq("context_encounter_id", *id),
            Self::Effective(date) => Predicate::instant("effective_start", *date),
        }
    }
}

impl Resource for MedicationStatement {
    const RESOURCE_TYPE: &'static str = "MedicationStatement";
    const TABLE: &'static str = "medication_statements";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.medication_statements (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'entered-in-error',
        'intended', 'stopped', 'on-hold', 'unknown', 'not-taken')),
    category_code TEXT,
    medication_id TEXT REFERENCES medications (id),
    medication_code TEXT,
    medication_display TEXT,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    context_encounter_id TEXT REFERENCES encounters (id),
    effective_start TEXT,
    effective_end TEXT,
    date_asserted TEXT,
    information_source_practitioner_id TEXT REFERENCES practitioners (id),
    reason_code TEXT,
    dosage_text TEXT,
    dose_quantity REAL,
    dose_unit TEXT,
    note TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_medication_statements_patient ON medication_statements (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_medication_statements_status ON medication_statements (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_medication_statements_medication
    ON medication_statements (medication_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_medication_statements_context
    ON medication_statements (context_encounter_id);
";

    type Filter = MedicationStatementFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("category_code", self.category_code.to_sql_value()),
            ("medication_id", self.medication_id.to_sql_value()),
            ("medication_code", self.medication_code.to_sql_value()),
            ("medication_display", self.medication_display.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("context_encounter_id", self.context_encounter_id.to_sql_value()),
            ("effective_start", self.effective_start.to_sql_value()),
            ("effective_end", self.effective_end.to_sql_value()),
            ("date_asserted", self.date_asserted.to_sql_value()),
            (
                "information_source_practitioner_id",
                self.information_source_practitioner_id.to_sql_value(),
            ),
            ("reason_code", self.reason_code.to_sql_value()),
            ("dosage_text", self.dosage_text.to_sql_value()),
            ("dose_quantity", self.dose_quantity.to_sql_value()),
            ("dose_unit", self.dose_unit.to_sql_value()),
            ("note", self.note.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            category_code: column(row, "category_code")?,
            medication_id: column(row, "medication_id")?,
            medication_code: column(row, "medication_code")?,
            medication_display: column(row, "medication_display")?,
            patient_id: column(row, "patient_id")?,
            context_encounter_id: column(row, "context_encounter_id")?,
            effective_start: column(row, "effective_start")?,
            effective_end: column(row, "effective_end")?,
            date_asserted: column(row, "date_asserted")?,
            information_source_practitioner_id: column(
                row,
                "information_source_practitioner_id",
            )?,
            reason_code: column(row, "reason_code")?,
            dosage_text: column(row, "dosage_text")?,
            dose_quantity: column(row, "dose_quantity")?,
            dose_unit: column(row, "dose_unit")?,
            note: column(row, "note")?,
        })
    }
}

pub type MedicationStatementRepository = Repository<MedicationStatement>;
