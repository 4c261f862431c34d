use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{DateParam, Predicate, SearchFilter, params};

/// Notification that a payment has been made or is pending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaymentNotice {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub request_reference: Option<String>,
    pub response_reference: Option<String>,
    pub created: DateTime<Utc>,
    pub provider_practitioner_id: Option<Uuid>,
    pub payment_reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub payee_organization_id: Option<Uuid>,
    pub recipient_organization_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_status_code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PaymentNoticeFilter {
    Status(String),
    Created(DateParam),
    Provider(Uuid),
    PaymentStatus(String),
    Recipient(Uuid),
}

impl SearchFilter for PaymentNoticeFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "status" => params::token(key, value).map(Self::Status),
            "created" => params::date(key, value).map(Self::Created),
            "provider" => params::uuid(key, value).map(Self::Provider),
            "payment-status" => params::token(key, value).map(Self::PaymentStatus),
            "recipient" => params::uuid(key, value).map(Self::Recipient),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Created(date) => Predicate::instant("created", *date),
            Self::Provider(id) => Predicate::eq("provider_practitioner_id", *id),
            Self::PaymentStatus(code) => Predicate::eq("payment_status_code", code.as_str()),
            Self::Recipient(id) => Predicate::eq("recipient_organization_id", *id),
        }
    }
}

impl Resource for PaymentNotice {
    const RESOURCE_TYPE: &'static str = "PaymentNotice";
    const TABLE: &'static str = "payment_notices";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.payment_notices (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'cancelled', 'draft', 'entered-in-error')),
    request_reference TEXT,
    response_reference TEXT,
    created TEXT NOT NULL,
    provider_practitioner_id TEXT REFERENCES practitioners (id),
    payment_reference TEXT,
    payment_date TEXT,
    payee_organization_id TEXT REFERENCES organizations (id),
    recipient_organization_id TEXT NOT NULL REFERENCES organizations (id),
    amount TEXT NOT NULL,
    currency TEXT NOT NULL,
    payment_status_code TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_payment_notices_status ON payment_notices (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_payment_notices_provider ON payment_notices (provider_practitioner_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_payment_notices_recipient
    ON payment_notices (recipient_organization_id);
";

    type Filter = PaymentNoticeFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("request_reference", self.request_reference.to_sql_value()),
            ("response_reference", self.response_reference.to_sql_value()),
            ("created", self.created.to_sql_value()),
            ("provider_practitioner_id", self.provider_practitioner_id.to_sql_value()),
            ("payment_reference", self.payment_reference.to_sql_value()),
            ("payment_date", self.payment_date.to_sql_value()),
            ("payee_organization_id", self.payee_organization_id.to_sql_value()),
            ("recipient_organization_id", self.recipient_organization_id.to_sql_value()),
            ("amount", self.amount.to_sql_value()),
            ("currency", self.currency.to_sql_value()),
            ("payment_status_code", self.payment_status_code.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            request_reference: column(row, "request_reference")?,
            response_reference: column(row, "response_reference")?,
            created: column(row, "created")?,
            provider_practitioner_id: column(row, "provider_practitioner_id")?,
            payment_reference: column(row, "payment_reference")?,
            payment_date: column(row, "payment_date")?,
            payee_organization_id: column(row, "payee_organization_id")?,
            recipient_organization_id: column(row, "recipient_organization_id")?,
            amount: column(row, "amount")?,
            currency: column(row, "currency")?,
            payment_status_code: column(row, "payment_status_code")?,
        })
    }
}

pub type PaymentNoticeRepository = Repository<PaymentNotice>;
