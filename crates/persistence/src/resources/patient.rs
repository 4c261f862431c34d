//! Patient demographics.

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A person receiving care.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub family_name: String,
    pub given_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// One of `male`, `female`, `other`, `unknown`.
    pub gender: Option<String>,
    /// Medical record number.
    pub mrn: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub enum PatientFilter {
    Name(String),
    Family(String),
    Gender(String),
    BirthDate(DateParam),
    Identifier(String),
    Active(bool),
}

impl SearchFilter for PatientFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "name" => params::token(key, value).map(Self::Name),
            "family" => params::token(key, value).map(Self::Family),
            "gender" => params::token(key, value).map(Self::Gender),
            "birthdate" => params::date(key, value).map(Self::BirthDate),
            "identifier" => params::token(key, value).map(Self::Identifier),
            "active" => params::boolean(key, value).map(Self::Active),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Name(name) => Predicate::text(&["family_name", "given_name"], name.as_str()),
            Self::Family(family) => Predicate::text(&["family_name"], family.as_str()),
            Self::Gender(gender) => Predicate::eq("gender", gender.as_str()),
            Self::BirthDate(date) => Predicate::calendar_date("birth_date", *date),
            Self::Identifier(mrn) => Predicate::eq("mrn", mrn.as_str()),
            Self::Active(active) => Predicate::eq("active", *active),
        }
    }
}

impl Resource for Patient {
    const RESOURCE_TYPE: &'static str = "Patient";
    const TABLE: &'static str = "patients";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.patients (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    family_name TEXT NOT NULL,
    given_name TEXT,
    birth_date TEXT,
    gender TEXT CHECK (gender IN ('male', 'female', 'other', 'unknown')),
    mrn TEXT,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS {ns}.idx_patients_mrn ON patients (mrn);
CREATE INDEX IF NOT EXISTS {ns}.idx_patients_family ON patients (family_name);
";

    type Filter = PatientFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("family_name", self.family_name.to_sql_value()),
            ("given_name", self.given_name.to_sql_value()),
            ("birth_date", self.birth_date.to_sql_value()),
            ("gender", self.gender.to_sql_value()),
            ("mrn", self.mrn.to_sql_value()),
            ("active", self.active.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            family_name: column(row, "family_name")?,
            given_name: column(row, "given_name")?,
            birth_date: column(row, "birth_date")?,
            gender: column(row, "gender")?,
            mrn: column(row, "mrn")?,
            active: column(row, "active")?,
        })
    }
}

pub type PatientRepository = Repository<Patient>;
