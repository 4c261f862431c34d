use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A clinical issue detected for a patient, such as a drug interaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedIssue {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub code_code: Option<String>,
    pub code_display: Option<String>,
    /// One of `high`, `moderate`, `low`.
    pub severity: Option<String>,
    pub patient_id: Option<Uuid>,
    pub identified_at: Option<DateTime<Utc>>,
    pub author_practitioner_id: Option<Uuid>,
    pub detail: Option<String>,
    pub reference_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum DetectedIssueFilter {
    Patient(Uuid),
    Status(String),
    Code(String),
    Author(Uuid),
    Identified(DateParam),
}

impl SearchFilter for DetectedIssueFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "code" => params::token(key, value).map(Self::Code),
            "author" => params::uuid(key, value).map(Self::Author),
            "identified" => params::date(key, value).map(Self::Identified),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Author(id) => Predicate::eq("author_practitioner_id", *id),
            Self::Identified(date) => Predicate::instant("identified_at", *date),
        }
    }
}

impl Resource for DetectedIssue {
    const RESOURCE_TYPE: &'static str = "DetectedIssue";
    const TABLE: &'static str = "detected_issues";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.detected_issues (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('registered', 'preliminary', 'final', 'amended',
        'corrected', 'cancelled', 'entered-in-error', 'unknown')),
    code_code TEXT,
    code_display TEXT,
    severity TEXT CHECK (severity IN ('high', 'moderate', 'low')),
    patient_id TEXT REFERENCES patients (id),
    identified_at TEXT,
    author_practitioner_id TEXT REFERENCES practitioners (id),
    detail TEXT,
    reference_url TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_detected_issues_patient ON detected_issues (patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_detected_issues_status ON detected_issues (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_detected_issues_author ON detected_issues (author_practitioner_id);
";

    type Filter = DetectedIssueFilter;

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
            ("code_display", self.code_display.to_sql_value()),
            ("severity", self.severity.to_sql_value()),
            ("patient_id", self.patient_id.to_sql_value()),
            ("identified_at", self.identified_at.to_sql_value()),
            ("author_practitioner_id", self.author_practitioner_id.to_sql_value()),
            ("detail", self.detail.to_sql_value()),
            ("reference_url", self.reference_url.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            severity: column(row, "severity")?,
            patient_id: column(row, "patient_id")?,
            identified_at: column(row, "identified_at")?,
            author_practitioner_id: column(row, "author_practitioner_id")?,
            detail: column(row, "detail")?,
            reference_url: column(row, "reference_url")?,
        })
    }
}

pub type DetectedIssueRepository = Repository<DetectedIssue>;
