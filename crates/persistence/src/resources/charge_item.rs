use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, NumberParam, Predicate, SearchFilter, params};

/// A billable item, optionally posted to an [`Account`](super::Account).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChargeItem {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub code_code: String,
    pub code_display: Option<String>,
    pub subject_patient_id: Uuid,
    pub context_encounter_id: Option<Uuid>,
    pub occurrence_at: Option<DateTime<Utc>>,
    pub performer_practitioner_id: Option<Uuid>,
    pub performing_organization_id: Option<Uuid>,
    pub quantity: Option<f64>,
    pub factor_override: Option<f64>,
    pub price_override: Option<Decimal>,
    pub currency: Option<String>,
    pub entered_at: Option<DateTime<Utc>>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum ChargeItemFilter {
    Patient(Uuid),
    Status(String),
    Code(String),
    Encounter(Uuid),
    Account(Uuid),
    Performer(Uuid),
    EnteredDate(DateParam),
    Quantity(NumberParam),
}

impl SearchFilter for ChargeItemFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "status" => params::token(key, value).map(Self::Status),
            "code" => params::token(key, value).map(Self::Code),
            "encounter" | "context" => params::uuid(key, value).map(Self::Encounter),
            "account" => params::uuid(key, value).map(Self::Account),
            "performer" => params::uuid(key, value).map(Self::Performer),
            "entered-date" => params::date(key, value).map(Self::EnteredDate),
            "quantity" => params::number(key, value).map(Self::Quantity),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Patient(id) => Predicate::eq("subject_patient_id", *id),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Code(code) => Predicate::eq("code_code", code.as_str()),
            Self::Encounter(id) => Predicate::eq("context_encounter_id", *id),
            Self::Account(id) => Predicate::eq("account_id", *id),
            Self::Performer(id) => Predicate::eq("performer_practitioner_id", *id),
            Self::EnteredDate(date) => Predicate::instant("entered_at", *date),
            Self::Quantity(number) => Predicate::number("quantity", *number),
        }
    }
}

impl Resource for ChargeItem {
    const RESOURCE_TYPE: &'static str = "ChargeItem";
    const TABLE: &'static str = "charge_items";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.charge_items (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('planned', 'billable', 'not-billable', 'aborted',
        'billed', 'entered-in-error', 'unknown')),
    code_code TEXT NOT NULL,
    code_display TEXT,
    subject_patient_id TEXT NOT NULL REFERENCES patients (id),
    context_encounter_id TEXT REFERENCES encounters (id),
    occurrence_at TEXT,
    performer_practitioner_id TEXT REFERENCES practitioners (id),
    performing_organization_id TEXT REFERENCES organizations (id),
    quantity REAL,
    factor_override REAL,
    price_override TEXT,
    currency TEXT,
    entered_at TEXT,
    account_id TEXT REFERENCES accounts (id)
);
CREATE INDEX IF NOT EXISTS {ns}.idx_charge_items_subject ON charge_items (subject_patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_charge_items_status ON charge_items (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_charge_items_encounter ON charge_items (context_encounter_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_charge_items_account ON charge_items (account_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_charge_items_performer ON charge_items (performer_practitioner_id);
";

    type Filter = ChargeItemFilter;

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
            ("subject_patient_id", self.subject_patient_id.to_sql_value()),
            ("context_encounter_id", self.context_encounter_id.to_sql_value()),
            ("occurrence_at", self.occurrence_at.to_sql_value()),
            ("performer_practitioner_id", self.performer_practitioner_id.to_sql_value()),
            ("performing_organization_id", self.performing_organization_id.to_sql_value()),
            ("quantity", self.quantity.to_sql_value()),
            ("factor_override", self.factor_override.to_sql_value()),
            ("price_override", self.price_override.to_sql_value()),
            ("currency", self.currency.to_sql_value()),
            ("entered_at", self.entered_at.to_sql_value()),
            ("account_id", self.account_id.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            code_code: column(row, "code_code")?,
            code_display: column(row, "code_display")?,
            subject_patient_id: column(row, "subject_patient_id")?,
            context_encounter_id: column(row, "context_encounter_id")?,
            occurrence_at: column(row, "occurrence_at")?,
            performer_practitioner_id: column(row, "performer_practitioner_id")?,
            performing_organization_id: column(row, "performing_organization_id")?,
            quantity: column(row, "quantity")?,
            factor_override: column(row, "factor_override")?,
            price_override: column(row, "price_override")?,
            currency: column(row, "currency")?,
            entered_at: column(row, "entered_at")?,
            account_id: column(row, "account_id")?,
        })
    }
}

pub type ChargeItemRepository = Repository<ChargeItem>;
