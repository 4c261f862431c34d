use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// An oncology diagnosis with its TNM staging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CancerDiagnosis {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub patient_id: Uuid,
    /// The general condition record this diagnosis refines, if any.
    pub condition_id: Option<Uuid>,
    pub diagnosed_at: DateTime<Utc>,
    pub cancer_type: String,
    pub primary_site: Option<String>,
    pub laterality: Option<String>,
    pub histology_code: Option<String>,
    pub morphology_code: Option<String>,
    /// e.g. `AJCC-8`.
    pub stage_system: Option<String>,
    pub stage_group: Option<String>,
    pub t_stage: Option<String>,
    pub n_stage: Option<String>,
    pub m_stage: Option<String>,
    pub grade: Option<String>,
    pub diagnosing_practitioner_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum CancerDiagnosisFilter {
    Patient(Uuid),
    Status(String),
    CancerType(String),
    Stage(String),
    Site(String),
    Date(DateParam),
}

impl SearchFilter for CancerDiagnosisFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "cancer-type" => params::token(key, value).map(Self::CancerType),
            "stage" => params::token(key, value).map(Self::Stage),
            "site" => params::token(key, value).map(Self::Site),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::CancerType(kind) => Predicate::eq("cancer_type", kind.as_str()),
            Self::Stage(stage) => Predicate::eq("stage_group", stage.as_str()),
            Self::Site(site) => Predicate::text(&["primary_site"], site.as_str()),
            Self::Date(date) => Predicate::instant("diagnosed_at", *date),
        }
    }
}

impl Resource for CancerDiagnosis {
    const RESOURCE_TYPE: &'static str = "CancerDiagnosis";
    const TABLE: &'static str = "cancer_diagnoses";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.cancer_diagnoses (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'in-remission', 'relapsed', 'resolved',
        'entered-in-error')),
    patient_id TEXT NOT NULL REFERENCES patients (id),
    condition_id TEXT REFERENCES conditions (id),
    diagnosed_at TEXT NOT NULL,
    cancer_type TEXT NOT NULL,
    primary_site TEXT,
    laterality TEXT CHECK (laterality IN ('left', 'right', 'bilateral', 'not-applicable')),
    histology_code TEXT,
    morphology_code TEXT,
    stage_system TEXT,
    stage_group TEXT,
    t_stage TEXT,
    n_stage TEXT,
    m_stage TEXT,
    grade TEXT,
    diagnosing_practitioner_id TEXT REFERENCES practitioners (id)
);
CREATE INDEX IF NOT EXISTS {ns}.idx_cancer_diagnoses_patient ON cancer_diagnoses (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_cancer_diagnoses_status ON cancer_diagnoses (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_cancer_diagnoses_type ON cancer_diagnoses (cancer_type);
CREATE INDEX IF NOT EXISTS {ns}.idx_cancer_diagnoses_condition ON cancer_diagnoses (condition_id);
";

    type Filter = CancerDiagnosisFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("condition_id", self.condition_id.to_sql_value()),
            ("diagnosed_at", self.diagnosed_at.to_sql_value()),
            ("cancer_type", self.cancer_type.to_sql_value()),
            ("primary_site", self.primary_site.to_sql_value()),
            ("laterality", self.laterality.to_sql_value()),
            ("histology_code", self.histology_code.to_sql_value()),
            ("morphology_code", self.morphology_code.to_sql_value()),
            ("stage_system", self.stage_system.to_sql_value()),
            ("stage_group", self.stage_group.to_sql_value()),
            ("t_stage", self.t_stage.to_sql_value()),
            ("n_stage", self.n_stage.to_sql_value()),
            ("m_stage", self.m_stage.to_sql_value()),
            ("grade", self.grade.to_sql_value()),
            ("diagnosing_practitioner_id", self.diagnosing_practitioner_id.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            patient_id: column(row, "patient_id")?,
            condition_id: column(row, "condition_id")?,
            diagnosed_at: column(row, "diagnosed_at")?,
            cancer_type: column(row, "cancer_type")?,
            primary_site: column(row, "primary_site")?,
            laterality: column(row, "laterality")?,
            histology_code: column(row, "histology_code")?,
            morphology_code: column(row, "morphology_code")?,
            stage_system: column(row, "stage_system")?,
            stage_group: column(row, "stage_group")?,
            t_stage: column(row, "t_stage")?,
            n_stage: column(row, "n_stage")?,
            m_stage: column(row, "m_stage")?,
            grade: column(row, "grade")?,
            diagnosing_practitioner_id: column(row, "diagnosing_practitioner_id")?,
        })
    }
}

pub type CancerDiagnosisRepository = Repository<CancerDiagnosis>;
