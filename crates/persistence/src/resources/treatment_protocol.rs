//! Treatment protocols (regimens) and the drugs they prescribe.

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
pub struct TreatmentProtocol {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub name: String,
    /// Short regimen code such as `FOLFOX`.
    pub protocol_code: Option<String>,
    pub cancer_type: Option<String>,
    pub modality: Option<String>,
    pub cycle_length_days: Option<i64>,
    pub total_cycles: Option<i64>,
    pub description: Option<String>,
    pub source: Option<String>,
}

/// A drug in a protocol. Returned ordered by `sequence`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreatmentProtocolDrug {
    pub id: Uuid,
    pub protocol_id: Uuid,
    pub medication_id: Option<Uuid>,
    pub drug_name: String,
    pub dose: Option<f64>,
    pub dose_unit: Option<String>,
    pub route: Option<String>,
    /// Days of the cycle on which the drug is given, e.g. `1,8,15`.
    pub cycle_days: Option<String>,
    pub sequence: i64,
}

#[derive(Debug, Clone)]
pub enum TreatmentProtocolFilter {
    Name(String),
    Status(String),
    Code(String),
    CancerType(String),
    Modality(String),
}

impl SearchFilter for TreatmentProtocolFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "name" => params::token(key, value).map(Self::Name),
            "status" => params::token(key, value).map(Self::Status),
            "code" => params::token(key, value).map(Self::Code),
            "cancer-type" => params::token(key, value).map(Self::CancerType),
            "modality" => params::token(key, value).map(Self::Modality),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Name(name) => Predicate::text(&["name"], name.as_str()),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Code(code) => Predicate::eq("protocol_code", code.as_str()),
            Self::CancerType(kind) => Predicate::eq("cancer_type", kind.as_str()),
            Self::Modality(modality) => Predicate::eq("modality", modality.as_str()),
        }
    }
}

impl Resource for TreatmentProtocol {
    const RESOURCE_TYPE: &'static str = "TreatmentProtocol";
    const TABLE: &'static str = "treatment_protocols";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.treatment_protocols (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'active', 'retired')),
    name TEXT NOT NULL,
    protocol_code TEXT,
    cancer_type TEXT,
    modality TEXT CHECK (modality IN ('chemotherapy', 'radiation', 'immunotherapy',
        'targeted', 'hormonal', 'combined')),
    cycle_length_days INTEGER CHECK (cycle_length_days > 0),
    total_cycles INTEGER CHECK (total_cycles > 0),
    description TEXT,
    source TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_treatment_protocols_status ON treatment_protocols (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_treatment_protocols_code ON treatment_protocols (protocol_code);
CREATE INDEX IF NOT EXISTS {ns}.idx_treatment_protocols_type ON treatment_protocols (cancer_type);
";

    type Filter = TreatmentProtocolFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("name", self.name.to_sql_value()),
            ("protocol_code", self.protocol_code.to_sql_value()),
            ("cancer_type", self.cancer_type.to_sql_value()),
            ("modality", self.modality.to_sql_value()),
            ("cycle_length_days", self.cycle_length_days.to_sql_value()),
            ("total_cycles", self.total_cycles.to_sql_value()),
            ("description", self.description.to_sql_value()),
            ("source", self.source.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            name: column(row, "name")?,
            protocol_code: column(row, "protocol_code")?,
            cancer_type: column(row, "cancer_type")?,
            modality: column(row, "modality")?,
            cycle_length_days: column(row, "cycle_length_days")?,
            total_cycles: column(row, "total_cycles")?,
            description: column(row, "description")?,
            source: column(row, "source")?,
        })
    }
}

impl ChildRecord for TreatmentProtocolDrug {
    type Parent = TreatmentProtocol;

    const RECORD_TYPE: &'static str = "TreatmentProtocolDrug";
    const TABLE: &'static str = "treatment_protocol_drugs";
    const PARENT_COLUMN: &'static str = "protocol_id";
    const ORDER_BY: &'static str = "sequence, rowid";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.treatment_protocol_drugs (
    id TEXT PRIMARY KEY,
    protocol_id TEXT NOT NULL REFERENCES treatment_protocols (id) ON DELETE CASCADE,
    medication_id TEXT REFERENCES medications (id),
    drug_name TEXT NOT NULL,
    dose REAL,
    dose_unit TEXT,
    route TEXT,
    cycle_days TEXT,
    sequence INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS {ns}.idx_treatment_protocol_drugs_parent
    ON treatment_protocol_drugs (protocol_id, sequence);
CREATE INDEX IF NOT EXISTS {ns}.idx_treatment_protocol_drugs_medication
    ON treatment_protocol_drugs (medication_id);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.protocol_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("protocol_id", self.protocol_id.to_sql_value()),
            ("medication_id", self.medication_id.to_sql_value()),
            ("drug_name", self.drug_name.to_sql_value()),
            ("dose", self.dose.to_sql_value()),
            ("dose_unit", self.dose_unit.to_sql_value()),
            ("route", self.route.to_sql_value()),
            ("cycle_days", self.cycle_days.to_sql_value()),
            ("sequence", self.sequence.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            protocol_id: column(row, "protocol_id")?,
            medication_id: column(row, "medication_id")?,
            drug_name: column(row, "drug_name")?,
            dose: column(row, "dose")?,
            dose_unit: column(row, "dose_unit")?,
            route: column(row, "route")?,
            cycle_days: column(row, "cycle_days")?,
            sequence: column(row, "sequence")?,
        })
    }
}

pub type TreatmentProtocolRepository = Repository<TreatmentProtocol>;

impl Repository<TreatmentProtocol> {
    pub async fn add_drug(
        &self,
        ctx: &TenantContext,
        drug: TreatmentProtocolDrug,
    ) -> StorageResult<TreatmentProtocolDrug> {
        self.add_child(ctx, drug).await
    }

    /// Drugs of a protocol, ordered by sequence.
    pub async fn get_drugs(
        &self,
        ctx: &TenantContext,
        protocol_id: Uuid,
    ) -> StorageResult<Vec<TreatmentProtocolDrug>> {
        self.get_children(ctx, protocol_id).await
    }
}
