use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A legally enforceable agreement, such as a consent or a payer contract.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contract {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub type_code: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub issued: Option<DateTime<Utc>>,
    pub applies_start: Option<DateTime<Utc>>,
    pub applies_end: Option<DateTime<Utc>>,
    pub subject_patient_id: Option<Uuid>,
    pub authority_organization_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum ContractFilter {
    Status(String),
    Patient(Uuid),
    Authority(Uuid),
    Issued(DateParam),
    Url(String),
    Title(String),
}

impl SearchFilter for ContractFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "status" => params::token(key, value).map(Self::Status),
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "authority" => params::uuid(key, value).map(Self::Authority),
            "issued" => params::date(key, value).map(Self::Issued),
            "url" => params::token(key, value).map(Self::Url),
            "title" => params::token(key, value).map(Self::Title),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Patient(id) => Predicate::eq("subject_patient_id", *id),
            Self::Authority(id) => Predicate::eq("authority_organization_id", *id),
            Self::Issued(date) => Predicate::instant("issued", *date),
            Self::Url(url) => Predicate::eq("url", url.as_str()),
            Self::Title(title) => Predicate::text(&["title"], title.as_str()),
        }
    }
}

impl Resource for Contract {
    const RESOURCE_TYPE: &'static str = "Contract";
    const TABLE: &'static str = "contracts";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.contracts (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('amended', 'appended', 'cancelled', 'disputed',
        'entered-in-error', 'executable', 'executed', 'negotiable', 'offered', 'policy',
        'rejected', 'renewed', 'revoked', 'resolved', 'terminated')),
    type_code TEXT,
    title TEXT,
    url TEXT,
    issued TEXT,
    applies_start TEXT,
    applies_end TEXT,
    subject_patient_id TEXT REFERENCES patients (id),
    authority_organization_id TEXT REFERENCES organizations (id)
);
CREATE INDEX IF NOT EXISTS {ns}.idx_contracts_status ON contracts (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_contracts_subject ON contracts (subject_patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_contracts_authority ON contracts (authority_organization_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_contracts_url ON contracts (url);
";

    type Filter = ContractFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("type_code", self.type_code.to_sql_value()),
            ("title", self.title.to_sql_value()),
            ("url", self.url.to_sql_value()),
            ("issued", self.issued.to_sql_value()),
            ("applies_start", self.applies_start.to_sql_value()),
            ("applies_end", self.applies_end.to_sql_value()),
            ("subject_patient_id", self.subject_patient_id.to_sql_value()),
            ("authority_organization_id", self.authority_organization_id.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            type_code: column(row, "type_code")?,
            title: column(row, "title")?,
            url: column(row, "url")?,
            issued: column(row, "issued")?,
            applies_start: column(row, "applies_start")?,
            applies_end: column(row, "applies_end")?,
            subject_patient_id: column(row, "subject_patient_id")?,
            authority_organization_id: column(row, "authority_organization_id")?,
        })
    }
}

pub type ContractRepository = Repository<Contract>;
