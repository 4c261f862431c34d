//! Chemotherapy cycles and the drug administrations given within them.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{ChildRecord, Repository, Resource, ResourceMeta};
use crate::error::{StorageResult, ValidationError};
use crate::search::{DateParam, NumberParam, Predicate, SearchFilter, params};
use crate::tenant::TenantContext;

/// One cycle of a chemotherapy regimen for a patient.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChemotherapyCycle {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub patient_id: Uuid,
    pub protocol_id: Option<Uuid>,
    pub cancer_diagnosis_id: Option<Uuid>,
    pub cycle_number: i64,
    pub planned_start: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub dose_reduction_pct: Option<f64>,
    pub notes: Option<String>,
}

/// A single drug administration within a cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChemoAdministration {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub medication_id: Option<Uuid>,
    pub drug_name: String,
    pub dose: f64,
    pub dose_unit: String,
    pub route: Option<String>,
    pub administered_at: DateTime<Utc>,
    pub administered_by_practitioner_id: Option<Uuid>,
    pub infusion_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ChemotherapyCycleFilter {
    Patient(Uuid),
    Status(String),
    Protocol(Uuid),
    Diagnosis(Uuid),
    Cycle(NumberParam),
    Date(DateParam),
}

impl SearchFilter for ChemotherapyCycleFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "protocol" => params::uuid(key, value).map(Self::Protocol),
            "diagnosis" => params::uuid(key, value).map(Self::Diagnosis),
            "cycle" => params::integer(key, value).map(Self::Cycle),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Protocol(id) => Predicate::eq("protocol_id", *id),
            Self::Diagnosis(id) => Predicate::eq("cancer_diagnosis_id", *id),
            Self::Cycle(number) => Predicate::number("cycle_number", *number),
            Self::Date(date) => Predicate::instant("planned_start", *date),
        }
    }
}

impl Resource for ChemotherapyCycle {
    const RESOURCE_TYPE: &'static str = "ChemotherapyCycle";
    const TABLE: &'static str = "chemotherapy_cycles";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.chemotherapy_cycles (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('planned', 'in-progress', 'completed', 'cancelled',
        'on-hold', 'entered-in-error')),
    patient_id TEXT NOT NULL REFERENCES patients (id),
    protocol_id TEXT REFERENCES treatment_protocols (id),
    cancer_diagnosis_id TEXT REFERENCES cancer_diagnoses (id),
    cycle_number INTEGER NOT NULL CHECK (cycle_number > 0),
    planned_start TEXT,
    actual_start TEXT,
    actual_end TEXT,
    dose_reduction_pct REAL CHECK (dose_reduction_pct BETWEEN 0 AND 100),
    notes TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_chemotherapy_cycles_patient ON chemotherapy_cycles (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_chemotherapy_cycles_status ON chemotherapy_cycles (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_chemotherapy_cycles_protocol ON chemotherapy_cycles (protocol_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_chemotherapy_cycles_diagnosis
    ON chemotherapy_cycles (cancer_diagnosis_id);
";

    type Filter = ChemotherapyCycleFilter;

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
            ("protocol_id", self.protocol_id.to_sql_value()),
            ("cancer_diagnosis_id", self.cancer_diagnosis_id.to_sql_value()),
            ("cycle_number", self.cycle_number.to_sql_value()),
            ("planned_start", self.planned_start.to_sql_value()),
            ("actual_start", self.actual_start.to_sql_value()),
            ("actual_end", self.actual_end.to_sql_value()),
            ("dose_reduction_pct", self.dose_reduction_pct.to_sql_value()),
            ("notes", self.notes.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            patient_id: column(row, "patient_id")?,
            protocol_id: column(row, "protocol_id")?,
            cancer_diagnosis_id: column(row, "cancer_diagnosis_id")?,
            cycle_number: column(row, "cycle_number")?,
            planned_start: column(row, "planned_start")?,
            actual_start: column(row, "actual_start")?,
            actual_end: column(row, "actual_end")?,
            dose_reduction_pct: column(row, "dose_reduction_pct")?,
            notes: column(row, "notes")?,
        })
    }
}

impl ChildRecord for ChemoAdministration {
    type Parent = ChemotherapyCycle;

    const RECORD_TYPE: &'static str = "ChemoAdministration";
    const TABLE: &'static str = "chemo_administrations";
    const PARENT_COLUMN: &'static str = "cycle_id";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.chemo_administrations (
    id TEXT PRIMARY KEY,
    cycle_id TEXT NOT NULL REFERENCES chemotherapy_cycles (id) ON DELETE CASCADE,
    medication_id TEXT REFERENCES medications (id),
    drug_name TEXT NOT NULL,
    dose REAL NOT NULL CHECK (dose >= 0),
    dose_unit TEXT NOT NULL,
    route TEXT,
    administered_at TEXT NOT NULL,
    administered_by_practitioner_id TEXT REFERENCES practitioners (id),
    infusion_minutes INTEGER,
    notes TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_chemo_administrations_parent
    ON chemo_administrations (cycle_id);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.cycle_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("cycle_id", self.cycle_id.to_sql_value()),
            ("medication_id", self.medication_id.to_sql_value()),
            ("drug_name", self.drug_name.to_sql_value()),
            ("dose", self.dose.to_sql_value()),
            ("dose_unit", self.dose_unit.to_sql_value()),
            ("route", self.route.to_sql_value()),
            ("administered_at", self.administered_at.to_sql_value()),
            (
                "administered_by_practitioner_id",
                self.administered_by_practitioner_id.to_sql_value(),
            ),
            ("infusion_minutes", self.infusion_minutes.to_sql_value()),
            ("notes", self.notes.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            cycle_id: column(row, "cycle_id")?,
            medication_id: column(row, "medication_id")?,
            drug_name: column(row, "drug_name")?,
            dose: column(row, "dose")?,
            dose_unit: column(row, "dose_unit")?,
            route: column(row, "route")?,
            administered_at: column(row, "administered_at")?,
            administered_by_practitioner_id: column(row, "administered_by_practitioner_id")?,
            infusion_minutes: column(row, "infusion_minutes")?,
            notes: column(row, "notes")?,
        })
    }
}

pub type ChemotherapyCycleRepository = Repository<ChemotherapyCycle>;

impl Repository<ChemotherapyCycle> {
    pub async fn add_administration(
        &self,
        ctx: &TenantContext,
        administration: ChemoAdministration,
    ) -> StorageResult<ChemoAdministration> {
        self.add_child(ctx, administration).await
    }

    pub async fn get_administrations(
        &self,
        ctx: &TenantContext,
        cycle_id: Uuid,
    ) -> StorageResult<Vec<ChemoAdministration>> {
        self.get_children(ctx, cycle_id).await
    }
}
