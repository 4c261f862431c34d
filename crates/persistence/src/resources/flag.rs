//! Flag: a prospective warning or notification about a patient.
//!
//! Flags are the reference shape for every other resource module: a record
//! struct carrying [`ResourceMeta`], a closed filter enum, a namespace DDL
//! template, and a repository alias.
//!
//! | Filter key | Column | Kind |
//! |---|---|---|
//! | `patient`, `subject` | `subject_patient_id` | reference |
//! | `status` | `status` | exact |
//! | `category` | `category_code` | exact |
//! | `code` | `code_code` | exact |
//! | `encounter` | `encounter_id` | reference |
//! | `author` | `author_practitioner_id` | reference |
//! | `date` | `period_start` | date |

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A warning attached to a patient, such as a fall risk or an infection
/// control precaution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Flag {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    /// One of `active`, `inactive`, `entered-in-error`.
    pub status: String,
    pub category_code: Option<String>,
    pub category_display: Option<String>,
    pub code_system: Option<String>,
    pub code_code: String,
    pub code_display: Option<String>,
    /// The flagged patient. Must reference a stored [`Patient`](super::Patient).
    pub subject_patient_id: Uuid,
    pub encounter_id: Option<Uuid>,
    pub author_practitioner_id: Option<Uuid>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// Search filters understood by [`FlagRepository`].
#[derive(Debug, Clone)]
pub enum FlagFilter {
    Patient(Uuid),
    Status(String),
    Category(String),
    Code(String),
    Encounter(Uuid),
    Author(Uuid),
    Date(DateParam),
}

impl SearchFilter for FlagFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "category" => params::token(key, value).map(Self::Category),
            "code" => params::token(key, value).map(Self::Code),
            "encounter" => params::uuid(key, value).map(Self::Encounter),
            "author" => params::uuid(key, value).map(Self::Author),
            "date" => params::date(key, value).map(Self::Date),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("subject_patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Category(category) => Predicate::eq("category_code", category.as_str()),
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Encounter(id) => Predicate::eq("encounter_id", *id),
            Self::Author(id) => Predicate::eq("author_practitioner_id", *id),
            Self::Date(date) => Predicate::instant("period_start", *date),
        }
    }
}

impl Resource for Flag {
    const RESOURCE_TYPE: &'static str = "Flag";
    const TABLE: &'static str = "flags";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.flags (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'entered-in-error')),
    category_code TEXT,
    category_display TEXT,
    code_system TEXT,
    code_code TEXT NOT NULL,
    code_display TEXT,
    subject_patient_id TEXT NOT NULL REFERENCES patients (id),
    encounter_id TEXT REFERENCES encounters (id),
    author_practitioner_id TEXT REFERENCES practitioners (id),
    period_start TEXT,
    period_end TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_flags_subject ON flags (subject_patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_flags_status ON flags (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_flags_encounter ON flags (encounter_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_flags_author ON flags (author_practitioner_id);
";

    type Filter = FlagFilter;

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
            ("category_display", self.category_display.to_sql_value()),
            ("code_system", self.code_system.to_sql_value()),
            ("code_code", self.code_code.to_sql_value()),
            ("code_display", self.code_display.to_sql_value()),
            ("subject_patient_id", self.subject_patient_id.to_sql_value()),
            ("encounter_id", self.encounter_id.to_sql_value()),
            ("author_practitioner_id", self.author_practitioner_id.to_sql_value()),
            ("period_start", self.period_start.to_sql_value()),
            ("period_end", self.period_end.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            category_code: column(row, "category_code")?,
            category_display: column(row, "category_display")?,
            code_system: column(row, "code_system")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            subject_patient_id: column(row, "subject_patient_id")?,
            encounter_id: column(row, "encounter_id")?,
            author_practitioner_id: column(row, "author_practitioner_id")?,
            period_start: column(row, "period_start")?,
            period_end: column(row, "period_end")?,
        })
    }
}

pub type FlagRepository = Repository<Flag>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Comparator;

    #[test]
    fn test_patient_and_subject_are_aliases() {
        let id = Uuid::new_v4();
        let id_text = id.to_string();
        for key in ["patient", "subject"] {
            let filter = FlagFilter::parse(key, id_text.as_str()).unwrap().unwrap();
            assert_eq!(filter.predicate(), Predicate::eq("subject_patient_id", id));
        }
    }

    #[test]
    fn test_date_filter_targets_period_start() {
        let filter = FlagFilter::parse("date", "ge2024-01-01").unwrap().unwrap();
        match filter.predicate() {
            Predicate::Instant { column, param } => {
                assert_eq!(column, "period_start");
                assert_eq!(param.comparator, Comparator::Ge);
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_bad_reference_is_rejected() {
        let err = FlagFilter::parse("patient", "not-a-uuid").unwrap().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidSearchParameter { ref parameter, .. } if parameter == "patient"
        ));
    }

    #[test]
    fn test_unknown_key() {
        assert!(FlagFilter::parse("colour", "red").is_none());
    }

    #[test]
    fn test_columns_exclude_identity() {
        let names: Vec<_> = Flag::default().columns().into_iter().map(|(n, _)| n).collect();
        assert!(!names.contains(&"id"));
        assert!(!names.contains(&"fhir_id"));
        assert!(!names.contains(&"created_at"));
        assert!(names.contains(&"subject_patient_id"));
    }
}
