use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{ChildRecord, Repository, Resource, ResourceMeta};
use crate::error::{StorageResult, ValidationError};
use crate::search::{DateParam, Predicate, SearchFilter, params};
use crate::tenant::TenantContext;

/// A propensity to an adverse reaction to a substance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllergyIntolerance {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    /// Either `allergy` or `intolerance`.
    pub allergy_type: Option<String>,
    /// One of `food`, `medication`, `environment`, `biologic`.
    pub category: Option<String>,
    /// One of `low`, `high`, `unable-to-assess`.
    pub criticality: Option<String>,
    pub code_code: String,
    pub code_display: Option<String>,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub onset_at: Option<DateTime<Utc>>,
    pub recorded_date: Option<DateTime<Utc>>,
    pub recorder_practitioner_id: Option<Uuid>,
    pub last_occurrence: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// One observed reaction event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllergyReaction {
    pub id: Uuid,
    pub allergy_intolerance_id: Uuid,
    pub substance_code: Option<String>,
    pub manifestation_code: String,
    pub manifestation_display: Option<String>,
    /// One of `mild`, `moderate`, `severe`.
    pub severity: Option<String>,
    pub onset_at: Option<DateTime<Utc>>,
    pub exposure_route: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AllergyIntoleranceFilter {
    Patient(Uuid),
    ClinicalStatus(String),
    VerificationStatus(String),
    Type(String),
    Category(String),
    Criticality(String),
    Code(String),
    Date(DateParam),
}

impl SearchFilter for AllergyIntoleranceFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" => params::uuid(key, value).map(Self::Patient),
            "clinical-status" => params::token(key, value).map(Self::ClinicalStatus),
            "verification-status" => params::token(key, value).map(Self::VerificationStatus),
            "type" => params::token(key, value).map(Self::Type),
            "category" => params::token(key, value).map(Self::Category),
            "criticality" => params::token(key, value).map(Self::Criticality),
            "code" => params::token(key, value).map(Self::Code),
            "date" => params::date(key, value).map(Self::Date),
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
            Self::Type(kind) => Predicate::eq("allergy_type", kind.as_str()),
            Self::Category(category) => Predicate::eq("category", category.as_str()),
            Self::Criticality(level) => Predicate::eq("criticality", level.as_str()),
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Date(date) => Predicate::instant("recorded_date", *date),
        }
    }
}

impl Resource for AllergyIntolerance {
    const RESOURCE_TYPE: &'static str = "AllergyIntolerance";
    const TABLE: &'static str = "allergy_intolerances";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.allergy_intolerances (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    clinical_status TEXT CHECK (clinical_status IN ('active', 'inactive', 'resolved')),
    verification_status TEXT CHECK (verification_status IN ('unconfirmed', 'confirmed',
        'refuted', 'entered-in-error')),
    allergy_type TEXT CHECK (allergy_type IN ('allergy', 'intolerance')),
    category TEXT CHECK (category IN ('food', 'medication', 'environment', 'biologic')),
    criticality TEXT CHECK (criticality IN ('low', 'high', 'unable-to-assess')),
    code_code TEXT NOT NULL,
    code_display TEXT,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    onset_at TEXT,
    recorded_date TEXT,
    recorder_practitioner_id TEXT REFERENCES practitioners (id),
    last_occurrence TEXT,
    note TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_allergy_intolerances_patient ON allergy_intolerances (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_allergy_intolerances_clinical_status
    ON allergy_intolerances (clinical_status);
CREATE INDEX IF NOT EXISTS {ns}.idx_allergy_intolerances_code ON allergy_intolerances (code_code);
";

    type Filter = AllergyIntoleranceFilter;

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
            ("allergy_type", self.allergy_type.to_sql_value()),
            ("category", self.category.to_sql_value()),
            ("criticality", self.criticality.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("code_display", self.code_display.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("onset_at", self.onset_at.to_sql_value()),
            ("recorded_date", self.recorded_date.to_sql_value()),
            ("recorder_practitioner_id", self.recorder_practitioner_id.to_sql_value()),
            ("last_occurrence", self.last_occurrence.to_sql_value()),
            ("note", self.note.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            clinical_status: column(row, "clinical_status")?,
            verification_status: column(row, "verification_status")?,
            allergy_type: column(row, "allergy_type")?,
            category: column(row, "category")?,
            criticality: column(row, "criticality")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            patient_id: column(row, "patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            onset_at: column(row, "onset_at")?,
            recorded_date: column(row, "recorded_date")?,
            recorder_practitioner_id: column(row, "recorder_practitioner_id")?,
            last_occurrence: column(row, "last_occurrence")?,
            note: column(row, "note")?,
        })
    }
}

impl ChildRecord for AllergyReaction {
    type Parent = AllergyIntolerance;

    const RECORD_TYPE: &'static str = "AllergyReaction";
    const TABLE: &'static str = "allergy_reactions";
    const PARENT_COLUMN: &'static str = "allergy_intolerance_id";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.allergy_reactions (
    id TEXT PRIMARY KEY,
    allergy_intolerance_id TEXT NOT NULL
        REFERENCES allergy_intolerances (id) ON DELETE CASCADE,
    substance_code TEXT,
    manifestation_code TEXT NOT NULL,
    manifestation_display TEXT,
    severity TEXT CHECK (severity IN ('mild', 'moderate', 'severe')),
    onset_at TEXT,
    exposure_route TEXT,
    description TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_allergy_reactions_parent
    ON allergy_reactions (allergy_intolerance_id);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.allergy_intolerance_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("allergy_intolerance_id", self.allergy_intolerance_id.to_sql_value()),
            ("substance_code", self.substance_code.to_sql_value()),
            ("manifestation_code", self.manifestation_code.to_sql_value()),
            ("manifestation_display", self.manifestation_display.to_sql_value()),
            ("severity", self.severity.to_sql_value()),
            ("onset_at", self.onset_at.to_sql_value()),
            ("exposure_route", self.exposure_route.to_sql_value()),
            ("description", self.description.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            allergy_intolerance_id: column(row, "allergy_intolerance_id")?,
            substance_code: column(row, "substance_code")?,
            manifestation_code: column(row, "manifestation_code")?,
            manifestation_display: column(row, "manifestation_display")?,
            severity: column(row, "severity")?,
            onset_at: column(row, "onset_at")?,
            exposure_route: column(row, "exposure_route")?,
            description: column(row, "description")?,
        })
    }
}

pub type AllergyIntoleranceRepository = Repository<AllergyIntolerance>;

impl Repository<AllergyIntolerance> {
    pub async fn add_reaction(
        &self,
        ctx: &TenantContext,
        reaction: AllergyReaction,
    ) -> StorageResult<AllergyReaction> {
        self.add_child(ctx, reaction).await
    }

    pub async fn get_reactions(
        &self,
        ctx: &TenantContext,
        allergy_intolerance_id: Uuid,
    ) -> StorageResult<Vec<AllergyReaction>> {
        self.get_children(ctx, allergy_intolerance_id).await
    }
}
