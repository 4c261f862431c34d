use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// An actual or potential harmful event affecting a patient.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdverseEvent {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    /// Either `actual` or `potential`.
    pub actuality: String,
    pub category_code: Option<String>,
    pub event_code: Option<String>,
    pub event_display: Option<String>,
    pub subject_patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub event_date: Option<DateTime<Utc>>,
    pub detected_at: Option<DateTime<Utc>>,
    pub recorded_date: Option<DateTime<Utc>>,
    pub seriousness_code: Option<String>,
    pub severity_code: Option<String>,
    pub outcome_code: Option<String>,
    pub recorder_practitioner_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AdverseEventFilter {
    Patient(Uuid),
    Actuality(String),
    Category(String),
    Event(String),
    Seriousness(String),
    Severity(String),
    Date(DateParam),
}

impl SearchFilter for AdverseEventFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "actuality" => params::token(key, value).map(Self::Actuality),
            "category" => params::token(key, value).map(Self::Category),
            "event" => params::token(key, value).map(Self::Event),
            "seriousness" => params::token(key, value).map(Self::Seriousness),
            "severity" => params::token(key, value).map(Self::Severity),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("subject_patient_id", *id),
            Self::Actuality(actuality) => Predicate::eq("actuality", actuality.as_str()),
            Self::Category(category) => Predicate::eq("category_code", category.as_str()),
            Self::Event(event) => Predicate::eq("event_code", event.as_str()),
            Self::Seriousness(code) => Predicate::eq("seriousness_code", code.as_str()),
            Self::Severity(code) => Predicate::eq("severity_code", code.as_str()),
            Self::Date(date) => Predicate::instant("event_date", *date),
        }
    }
}

impl Resource for AdverseEvent {
    const RESOURCE_TYPE: &'static str = "AdverseEvent";
    const TABLE: &'static str = "adverse_events";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.adverse_events (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    actuality TEXT NOT NULL CHECK (actuality IN ('actual', 'potential')),
    category_code TEXT,
    event_code TEXT,
    event_display TEXT,
    subject_patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    event_date TEXT,
    detected_at TEXT,
    recorded_date TEXT,
    seriousness_code TEXT,
    severity_code TEXT,
    outcome_code TEXT,
    recorder_practitioner_id TEXT REFERENCES practitioners (id),
    description TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_adverse_events_subject ON adverse_events (subject_patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_adverse_events_actuality ON adverse_events (actuality);
CREATE INDEX IF NOT EXISTS {ns}.idx_adverse_events_encounter ON adverse_events (encounter_id);
";

    type Filter = AdverseEventFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("actuality", self.actuality.to_sql_value()),
            ("category_code", self.category_code.to_sql_value()),
            ("event_code", self.event_code.to_sql_value()),
            ("event_display", self.event_display.to_sql_value()),
            ("subject_patient_id", self.subject_patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("event_date", self.event_date.to_sql_value()),
            ("detected_at", self.detected_at.to_sql_value()),
            ("recorded_date", self.recorded_date.to_sql_value()),
            ("seriousness_code", self.seriousness_code.to_sql_value()),
            ("severity_code", self.severity_code.to_sql_value()),
            ("outcome_code", self.outcome_code.to_sql_value()),
            ("recorder_practitioner_id", self.recorder_practitioner_id.to_sql_value()),
            ("description", self.description.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            actuality: column(row, "actuality")?,
            category_code: column(row, "category_code")?,
            event_code: column(row, "event_code")?,
            event_display: column(row, "event_display")?,
            subject_patient_id: column(row, "subject_patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            event_date: column(row, "event_date")?,
            detected_at: column(row, "detected_at")?,
            recorded_date: column(row, "recorded_date")?,
            seriousness_code: column(row, "seriousness_code")?,
            severity_code: column(row, "severity_code")?,
            outcome_code: column(row, "outcome_code")?,
            recorder_practitioner_id: column(row, "recorder_practitioner_id")?,
            description: column(row, "description")?,
        })
    }
}

pub type AdverseEventRepository = Repository<AdverseEvent>;
