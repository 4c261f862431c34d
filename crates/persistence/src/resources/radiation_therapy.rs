//! Radiation therapy courses and their delivered sessions (fractions).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{ChildRecord, Repository, Resource, ResourceMeta};
use crate::error::{StorageResult, ValidationError};
use crate::search::{Predicate, SearchFilter, params};
use crate::tenant::TenantContext;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadiationTherapy {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub patient_id: Uuid,
    pub cancer_diagnosis_id: Option<Uuid>,
    pub treatment_site: String,
    /// One of `ebrt`, `imrt`, `sbrt`, `brachytherapy`, `proton`.
    pub modality: Option<String>,
    pub total_dose_gy: Option<f64>,
    pub fractions_planned: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub radiation_oncologist_id: Option<Uuid>,
}

/// One delivered fraction. Returned ordered by `session_number`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadiationSession {
    pub id: Uuid,
    pub radiation_therapy_id: Uuid,
    pub session_number: i64,
    pub session_at: DateTime<Utc>,
    pub dose_gy: f64,
    pub field_name: Option<String>,
    pub completed: bool,
    pub technician_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RadiationTherapyFilter {
    Patient(Uuid),
    Status(String),
    Diagnosis(Uuid),
    Site(String),
    Modality(String),
}

impl SearchFilter for RadiationTherapyFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "diagnosis" => params::uuid(key, value).map(Self::Diagnosis),
            "site" => params::token(key, value).map(Self::Site),
            "modality" => params::token(key, value).map(Self::Modality),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Diagnosis(id) => Predicate::eq("cancer_diagnosis_id", *id),
            Self::Site(site) => Predicate::text(&["treatment_site"], site.as_str()),
            Self::Modality(modality) => Predicate::eq("modality", modality.as_str()),
        }
    }
}

impl Resource for RadiationTherapy {
    const RESOURCE_TYPE: &'static str = "RadiationTherapy";
    const TABLE: &'static str = "radiation_therapies";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.radiation_therapies (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('planned', 'in-progress', 'completed', 'cancelled',
        'entered-in-error')),
    patient_id TEXT NOT NULL REFERENCES patients (id),
    cancer_diagnosis_id TEXT REFERENCES cancer_diagnoses (id),
    treatment_site TEXT NOT NULL,
    modality TEXT CHECK (modality IN ('ebrt', 'imrt', 'sbrt', 'brachytherapy', 'proton')),
    total_dose_gy REAL CHECK (total_dose_gy >= 0),
    fractions_planned INTEGER CHECK (fractions_planned > 0),
    start_date TEXT,
    end_date TEXT,
    radiation_oncologist_id TEXT REFERENCES practitioners (id)
);
CREATE INDEX IF NOT EXISTS {ns}.idx_radiation_therapies_patient ON radiation_therapies (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_radiation_therapies_status ON radiation_therapies (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_radiation_therapies_diagnosis
    ON radiation_therapies (cancer_diagnosis_id);
";

    type Filter = RadiationTherapyFilter;

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
            ("cancer_diagnosis_id", self.cancer_diagnosis_id.to_sql_value()),
            ("treatment_site", self.treatment_site.to_sql_value()),
            ("modality", self.modality.to_sql_value()),
            ("total_dose_gy", self.total_dose_gy.to_sql_value()),
            ("fractions_planned", self.fractions_planned.to_sql_value()),
            ("start_date", self.start_date.to_sql_value()),
            ("end_date", self.end_date.to_sql_value()),
            ("radiation_oncologist_id", self.radiation_oncologist_id.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            patient_id: column(row, "patient_id")?,
            cancer_diagnosis_id: column(row, "cancer_diagnosis_id")?,
            treatment_site: column(row, "treatment_site")?,
            modality: column(row, "modality")?,
            total_dose_gy: column(row, "total_dose_gy")?,
            fractions_planned: column(row, "fractions_planned")?,
            start_date: column(row, "start_date")?,
            end_date: column(row, "end_date")?,
            radiation_oncologist_id: column(row, "radiation_oncologist_id")?,
        })
    }
}

impl ChildRecord for RadiationSession {
    type Parent = RadiationTherapy;

    const RECORD_TYPE: &'static str = "RadiationSession";
    const TABLE: &'static str = "radiation_sessions";
    const PARENT_COLUMN: &'static str = "radiation_therapy_id";
    const ORDER_BY: &'static str = "session_number, rowid";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.radiation_sessions (
    id TEXT PRIMARY KEY,
    radiation_therapy_id TEXT NOT NULL REFERENCES radiation_therapies (id) ON DELETE CASCADE,
    session_number INTEGER NOT NULL CHECK (session_number > 0),
    session_at TEXT NOT NULL,
    dose_gy REAL NOT NULL CHECK (dose_gy >= 0),
    field_name TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    technician_notes TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_radiation_sessions_parent
    ON radiation_sessions (radiation_therapy_id, session_number);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.radiation_therapy_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("radiation_therapy_id", self.radiation_therapy_id.to_sql_value()),
            ("session_number", self.session_number.to_sql_value()),
            ("session_at", self.session_at.to_sql_value()),
            ("dose_gy", self.dose_gy.to_sql_value()),
            ("field_name", self.field_name.to_sql_value()),
            ("completed", self.completed.to_sql_value()),
            ("technician_notes", self.technician_notes.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            radiation_therapy_id: column(row, "radiation_therapy_id")?,
            session_number: column(row, "session_number")?,
            session_at: column(row, "session_at")?,
            dose_gy: column(row, "dose_gy")?,
            field_name: column(row, "field_name")?,
            completed: column(row, "completed")?,
            technician_notes: column(row, "technician_notes")?,
        })
    }
}

pub type RadiationTherapyRepository = Repository<RadiationTherapy>;

impl Repository<RadiationTherapy> {
    pub async fn add_session(
        &self,
        ctx: &TenantContext,
        session: RadiationSession,
    ) -> StorageResult<RadiationSession> {
        self.add_child(ctx, session).await
    }

    /// Sessions of a course, ordered by session number.
    pub async fn get_sessions(
        &self,
        ctx: &TenantContext,
        radiation_therapy_id: Uuid,
    ) -> StorageResult<Vec<RadiationSession>> {
        self.get_children(ctx, radiation_therapy_id).await
    }
}
