use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, NumberParam, Predicate, SearchFilter, params};

/// An estimate of the likelihood of an outcome for a patient.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub method_code: Option<String>,
    pub code_code: Option<String>,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub performer_practitioner_id: Option<Uuid>,
    pub occurrence_at: Option<DateTime<Utc>>,
    pub outcome_code: Option<String>,
    /// Between 0 and 1 inclusive.
    pub probability: Option<f64>,
    pub qualitative_risk: Option<String>,
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RiskAssessmentFilter {
    Patient(Uuid),
    Status(String),
    Method(String),
    Performer(Uuid),
    Probability(NumberParam),
    Date(DateParam),
}

impl SearchFilter for RiskAssessmentFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "method" => params::token(key, value).map(Self::Method),
            "performer" => params::uuid(key, value).map(Self::Performer),
            "probability" => params::number(key, value).map(Self::Probability),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Method(method) => Predicate::eq("method_code", method.as_str()),
            Self::Performer(id) => Predicate::eq("performer_practitioner_id", *id),
            Self::Probability(number) => Predicate::number("probability", *number),
            Self::Date(date) => Predicate::instant("occurrence_at", *date),
        }
    }
}

impl Resource for RiskAssessment {
    const RESOURCE_TYPE: &'static str = "RiskAssessment";
    const TABLE: &'static str = "risk_assessments";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.risk_assessments (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('registered', 'preliminary', 'final', 'amended',
        'corrected', 'cancelled', 'entered-in-error', 'unknown')),
    method_code TEXT,
    code_code TEXT,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    performer_practitioner_id TEXT REFERENCES practitioners (id),
    occurrence_at TEXT,
    outcome_code TEXT,
    probability REAL CHECK (probability BETWEEN 0 AND 1),
    qualitative_risk TEXT,
    mitigation TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_risk_assessments_patient ON risk_assessments (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_risk_assessments_status ON risk_assessments (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_risk_assessments_performer
    ON risk_assessments (performer_practitioner_id);
";

    type Filter = RiskAssessmentFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("method_code", self.method_code.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("performer_practitioner_id", self.performer_practitioner_id.to_sql_value()),
            ("occurrence_at", self.occurrence_at.to_sql_value()),
            ("outcome_code", self.outcome_code.to_sql_value()),
            ("probability", self.probability.to_sql_value()),
            ("qualitative_risk", self.qualitative_risk.to_sql_value()),
            ("mitigation", self.mitigation.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            method_code: column(row, "method_code")?,
            code_code: column(row, "code_code")?,
            patient_id: column(row, "patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            performer_practitioner_id: column(row, "performer_practitioner_id")?,
            occurrence_at: column(row, "occurrence_at")?,
            outcome_code: column(row, "outcome_code")?,
            probability: column(row, "probability")?,
            qualitative_risk: column(row, "qualitative_risk")?,
            mitigation: column(row, "mitigation")?,
        })
    }
}

pub type RiskAssessmentRepository = Repository<RiskAssessment>;
