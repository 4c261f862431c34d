use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// A financial account against which charges are tracked.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Account {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub type_code: Option<String>,
    pub name: Option<String>,
    pub subject_patient_id: Option<Uuid>,
    pub owner_organization_id: Option<Uuid>,
    pub service_period_start: Option<DateTime<Utc>>,
    pub service_period_end: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AccountFilter {
    Patient(Uuid),
    Status(String),
    Name(String),
    Type(String),
    Owner(Uuid),
    Period(DateParam),
}

impl SearchFilter for AccountFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "name" => params::token(key, value).map(Self::Name),
            "type" => params::token(key, value).map(Self::Type),
            "owner" => params::uuid(key, value).map(Self::Owner),
            "period" => params::date(key, value).map(Self::Period),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("subject_patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Name(name) => Predicate::text(&["name"], name.as_str()),
            Self::Type(type_code) => Predicate::eq("type_code", type_code.as_str()),
            Self::Owner(id) => Predicate::eq("owner_organization_id", *id),
            Self::Period(date) => Predicate::instant("service_period_start", *date),
        }
    }
}

impl Resource for Account {
    const RESOURCE_TYPE: &'static str = "Account";
    const TABLE: &'static str = "accounts";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.accounts (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'entered-in-error',
        'on-hold', 'unknown')),
    type_code TEXT,
    name TEXT,
    subject_patient_id TEXT REFERENCES patients (id),
    owner_organization_id TEXT REFERENCES organizations (id),
    service_period_start TEXT,
    service_period_end TEXT,
    description TEXT,
    balance TEXT,
    currency TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_accounts_subject ON accounts (subject_patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_accounts_status ON accounts (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_accounts_owner ON accounts (owner_organization_id);
";

    type Filter = AccountFilter;

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
            ("name", self.name.to_sql_value()),
            ("subject_patient_id", self.subject_patient_id.to_sql_value()),
            ("owner_organization_id", self.owner_organization_id.to_sql_value()),
            ("service_period_start", self.service_period_start.to_sql_value()),
            ("service_period_end", self.service_period_end.to_sql_value()),
            ("description", self.description.to_sql_value()),
            ("balance", self.balance.to_sql_value()),
            ("currency", self.currency.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            type_code: column(row, "type_code")?,
            name: column(row, "name")?,
            subject_patient_id: column(row, "subject_patient_id")?,
            owner_organization_id: column(row, "owner_organization_id")?,
            service_period_start: column(row, "service_period_start")?,
            service_period_end: column(row, "service_period_end")?,
            description: column(row, "description")?,
            balance: column(row, "balance")?,
            currency: column(row, "currency")?,
        })
    }
}

pub type AccountRepository = Repository<Account>;
