use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A clinician's assessment of a patient's condition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClinicalImpression {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub code_code: Option<String>,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub assessor_practitioner_id: Option<Uuid>,
    pub effective_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub prognosis_code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ClinicalImpressionFilter {
    Patient(Uuid),
    Status(String),
    Assessor(Uuid),
    Encounter(Uuid),
    Date(DateParam),
}

impl SearchFilter for ClinicalImpressionFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "assessor" => params::uuid(key, value).map(Self::Assessor),
            "encounter" => params::uuid(key, value).map(Self::Encounter),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Assessor(id) => Predicate::eq("assessor_practitioner_id", *id),
            Self::Encounter(id) => Predicate::eq("encounter_id", *id),
            Self::Date(date) => Predicate::instant("effective_at", *date),
        }
    }
}

impl Resource for ClinicalImpression {
    const RESOURCE_TYPE: &'static str = "ClinicalImpression";
    const TABLE: &'static str = "clinical_impressions";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.clinical_impressions (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('in-progress', 'completed', 'entered-in-error')),
    code_code TEXT,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    assessor_practitioner_id TEXT REFERENCES practitioners (id),
    effective_at TEXT,
    description TEXT,
    summary TEXT,
    prognosis_code TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_clinical_impressions_patient ON clinical_impressions (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_clinical_impressions_status ON clinical_impressions (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_clinical_impressions_assessor
    ON clinical_impressions (assessor_practitioner_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_clinical_impressions_encounter ON clinical_impressions (encounter_id);
";

    type Filter = ClinicalImpressionFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("assessor_practitioner_id", self.assessor_practitioner_id.to_sql_value()),
            ("effective_at", self.effective_at.to_sql_value()),
            ("description", self.description.to_sql_value()),
            ("summary", self.summary.to_sql_value()),
            ("prognosis_code", self.prognosis_code.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            code_code: column(row, "code_code")?,
            patient_id: column(row, "patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            assessor_practitioner_id: column(row, "assessor_practitioner_id")?,
            effective_at: column(row, "effective_at")?,
            description: column(row, "description")?,
            summary: column(row, "summary")?,
            prognosis_code: column(row, "prognosis_code")?,
        })
    }
}

pub type ClinicalImpressionRepository = Repository<ClinicalImpression>;
