//! Observations and their components.
//!
//! Components are stored in their own table and come back in the order they
//! were added. Deleting an observation removes its components.

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

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub category_code: Option<String>,
    pub code_system: Option<String>,
    pub code_code: String,
    pub code_display: Option<String>,
    pub patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub performer_practitioner_id: Option<Uuid>,
    pub effective_at: Option<DateTime<Utc>>,
    pub issued: Option<DateTime<Utc>>,
    pub value_quantity: Option<f64>,
    pub value_unit: Option<String>,
    pub value_string: Option<String>,
    pub value_code: Option<String>,
    pub interpretation_code: Option<String>,
    pub reference_range_low: Option<f64>,
    pub reference_range_high: Option<f64>,
    pub note: Option<String>,
}

/// A coded sub-measurement, e.g. the systolic part of a blood pressure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservationComponent {
    pub id: Uuid,
    pub observation_id: Uuid,
    pub code_code: String,
    pub code_display: Option<String>,
    pub value_quantity: Option<f64>,
    pub value_unit: Option<String>,
    pub value_string: Option<String>,
    pub interpretation_code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ObservationFilter {
    Patient(Uuid),
    Status(String),
    Category(String),
    Code(String),
    Encounter(Uuid),
    Performer(Uuid),
    Date(DateParam),
    ValueQuantity(NumberParam),
}

impl SearchFilter for ObservationFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "category" => params::token(key, value).map(Self::Category),
            "code" => params::token(key, value).map(Self::Code),
            "encounter" => params::uuid(key, value).map(Self::Encounter),
            "performer" => params::uuid(key, value).map(Self::Performer),
            "date" => params::date(key, value).map(Self::Date),
            "value-quantity" => params::number(key, value).map(Self::ValueQuantity),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Category(code) => Predicate::eq("category_code", code.as_str()),
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Encounter(id) => Predicate::eq("encounter_id", *id),
            Self::Performer(id) => Predicate::eq("performer_practitioner_id", *id),
            Self::Date(date) => Predicate::instant("effective_at", *date),
            Self::ValueQuantity(number) => Predicate::number("value_quantity", *number),
        }
    }
}

impl Resource for Observation {
    const RESOURCE_TYPE: &'static str = "Observation";
    const TABLE: &'static str = "observations";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.observations (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('registered', 'preliminary', 'final', 'amended',
        'corrected', 'cancelled', 'entered-in-error', 'unknown')),
    category_code TEXT,
    code_system TEXT,
    code_code TEXT NOT NULL,
    code_display TEXT,
    patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    performer_practitioner_id TEXT REFERENCES practitioners (id),
    effective_at TEXT,
    issued TEXT,
    value_quantity REAL,
    value_unit TEXT,
    value_string TEXT,
    value_code TEXT,
    interpretation_code TEXT,
    reference_range_low REAL,
    reference_range_high REAL,
    note TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_observations_patient ON observations (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_observations_status ON observations (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_observations_code ON observations (code_code);
CREATE INDEX IF NOT EXISTS {ns}.idx_observations_encounter ON observations (encounter_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_observations_performer ON observations (performer_practitioner_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_observations_effective ON observations (effective_at);
";

    type Filter = ObservationFilter;

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
            ("code_system", self.code_system.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("code_display", self.code_display.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("performer_practitioner_id", self.performer_practitioner_id.to_sql_value()),
            ("effective_at", self.effective_at.to_sql_value()),
            ("issued", self.issued.to_sql_value()),
            ("value_quantity", self.value_quantity.to_sql_value()),
            ("value_unit", self.value_unit.to_sql_value()),
            ("value_string", self.value_string.to_sql_value()),
            ("value_code", self.value_code.to_sql_value()),
            ("interpretation_code", self.interpretation_code.to_sql_value()),
            ("reference_range_low", self.reference_range_low.to_sql_value()),
            ("reference_range_high", self.reference_range_high.to_sql_value()),
            ("note", self.note.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            category_code: column(row, "category_code")?,
            code_system: column(row, "code_system")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            patient_id: column(row, "patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            performer_practitioner_id: column(row, "performer_practitioner_id")?,
            effective_at: column(row, "effective_at")?,
            issued: column(row, "issued")?,
            value_quantity: column(row, "value_quantity")?,
            value_unit: column(row, "value_unit")?,
            value_string: column(row, "value_string")?,
            value_code: column(row, "value_code")?,
            interpretation_code: column(row, "interpretation_code")?,
            reference_range_low: column(row, "reference_range_low")?,
            reference_range_high: column(row, "reference_range_high")?,
            note: column(row, "note")?,
        })
    }
}

impl ChildRecord for ObservationComponent {
    type Parent = Observation;

    const RECORD_TYPE: &'static str = "ObservationComponent";
    const TABLE: &'static str = "observation_components";
    const PARENT_COLUMN: &'static str = "observation_id";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.observation_components (
    id TEXT PRIMARY KEY,
    observation_id TEXT NOT NULL REFERENCES observations (id) ON DELETE CASCADE,
    code_code TEXT NOT NULL,
    code_display TEXT,
    value_quantity REAL,
    value_unit TEXT,
    value_string TEXT,
    interpretation_code TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_observation_components_parent
    ON observation_components (observation_id);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.observation_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("observation_id", self.observation_id.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("code_display", self.code_display.to_sql_value()),
            ("value_quantity", self.value_quantity.to_sql_value()),
            ("value_unit", self.value_unit.to_sql_value()),
            ("value_string", self.value_string.to_sql_value()),
            ("interpretation_code", self.interpretation_code.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            observation_id: column(row, "observation_id")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            value_quantity: column(row, "value_quantity")?,
            value_unit: column(row, "value_unit")?,
            value_string: column(row, "value_string")?,
            interpretation_code: column(row, "interpretation_code")?,
        })
    }
}

pub type ObservationRepository = Repository<Observation>;

impl Repository<Observation> {
    pub async fn add_component(
        &self,
        ctx: &TenantContext,
        component: ObservationComponent,
    ) -> StorageResult<ObservationComponent> {
        self.add_child(ctx, component).await
    }

    pub async fn get_components(
        &self,
        ctx: &TenantContext,
        observation_id: Uuid,
    ) -> StorageResult<Vec<ObservationComponent>> {
        self.get_children(ctx, observation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_quantity_uses_number_comparison() {
        let filter = ObservationFilter::parse("value-quantity", "gt120")
            .unwrap()
            .unwrap();
        let fragment = crate::search::SearchTranslator::where_clause(&[filter.predicate()]);
        assert!(fragment.sql.contains("value_quantity >"));
        assert_eq!(fragment.params.len(), 1);
    }

    #[test]
    fn test_component_columns_carry_parent() {
        let parent = Uuid::new_v4();
        let component = ObservationComponent {
            observation_id: parent,
            code_code: "8480-6".into(),
            ..Default::default()
        };
        let columns = component.columns();
        assert_eq!(columns[0].0, "observation_id");
        assert_eq!(component.parent_id(), parent);
        assert!(columns.iter().all(|(name, _)| *name != "id"));
    }
}
