//! Payment reconciliations and their per-payment details.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{ChildRecord, Repository, Resource, ResourceMeta};
use crate::error::{StorageResult, ValidationError};
use crate::search::{DateParam, Predicate, SearchFilter, params};
use crate::tenant::TenantContext;

/// A bulk payment and how it is allocated across claims.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaymentReconciliation {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub payment_issuer_organization_id: Option<Uuid>,
    pub requestor_practitioner_id: Option<Uuid>,
    /// One of `queued`, `complete`, `error`, `partial`.
    pub outcome: Option<String>,
    pub disposition: Option<String>,
    pub payment_date: NaiveDate,
    pub payment_amount: Decimal,
    pub currency: String,
    pub payment_identifier: Option<String>,
}

/// One line of a reconciliation. Details are returned ordered by `sequence`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconciliationDetail {
    pub id: Uuid,
    pub reconciliation_id: Uuid,
    pub type_code: String,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub detail_date: Option<NaiveDate>,
    pub predecessor_reference: Option<String>,
    pub sequence: i64,
}

#[derive(Debug, Clone)]
pub enum PaymentReconciliationFilter {
    Status(String),
    Created(DateParam),
    Outcome(String),
    PaymentIssuer(Uuid),
    Requestor(Uuid),
    Disposition(String),
}

impl SearchFilter for PaymentReconciliationFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "status" => params::token(key, value).map(Self::Status),
            "created" => params::date(key, value).map(Self::Created),
            "outcome" => params::token(key, value).map(Self::Outcome),
            "payment-issuer" => params::uuid(key, value).map(Self::PaymentIssuer),
            "requestor" => params::uuid(key, value).map(Self::Requestor),
            "disposition" => params::token(key, value).map(Self::Disposition),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Created(date) => Predicate::instant("created", *date),
            Self::Outcome(outcome) => Predicate::eq("outcome", outcome.as_str()),
            Self::PaymentIssuer(id) => Predicate::eq("payment_issuer_organization_id", *id),
            Self::Requestor(id) => Predicate::eq("requestor_practitioner_id", *id),
            Self::Disposition(text) => Predicate::text(&["disposition"], text.as_str()),
        }
    }
}

impl Resource for PaymentReconciliation {
    const RESOURCE_TYPE: &'static str = "PaymentReconciliation";
    const TABLE: &'static str = "payment_reconciliations";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.payment_reconciliations (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'cancelled', 'draft', 'entered-in-error')),
    period_start TEXT,
    period_end TEXT,
    created TEXT NOT NULL,
    payment_issuer_organization_id TEXT REFERENCES organizations (id),
    requestor_practitioner_id TEXT REFERENCES practitioners (id),
    outcome TEXT CHECK (outcome IN ('queued', 'complete', 'error', 'partial')),
    disposition TEXT,
    payment_date TEXT NOT NULL,
    payment_amount TEXT NOT NULL,
    currency TEXT NOT NULL,
    payment_identifier TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_payment_reconciliations_status ON payment_reconciliations (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_payment_reconciliations_issuer
    ON payment_reconciliations (payment_issuer_organization_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_payment_reconciliations_requestor
    ON payment_reconciliations (requestor_practitioner_id);
";

    type Filter = PaymentReconciliationFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("period_start", self.period_start.to_sql_value()),
            ("period_end", self.period_end.to_sql_value()),
            ("created", self.created.to_sql_value()),
            (
                "payment_issuer_organization_id",
                self.payment_issuer_organization_id.to_sql_value(),
            ),
            ("requestor_practitioner_id", self.requestor_practitioner_id.to_sql_value()),
            ("outcome", self.outcome.to_sql_value()),
            ("disposition", self.disposition.to_sql_value()),
            ("payment_date", self.payment_date.to_sql_value()),
            ("payment_amount", self.payment_amount.to_sql_value()),
            ("currency", self.currency.to_sql_value()),
            ("payment_identifier", self.payment_identifier.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            period_start: column(row, "period_start")?,
            period_end: column(row, "period_end")?,
            created: column(row, "created")?,
            payment_issuer_organization_id: column(row, "payment_issuer_organization_id")?,
            requestor_practitioner_id: column(row, "requestor_practitioner_id")?,
            outcome: column(row, "outcome")?,
            disposition: column(row, "disposition")?,
            payment_date: column(row, "payment_date")?,
            payment_amount: column(row, "payment_amount")?,
            currency: column(row, "currency")?,
            payment_identifier: column(row, "payment_identifier")?,
        })
    }
}

impl ChildRecord for ReconciliationDetail {
    type Parent = PaymentReconciliation;

    const RECORD_TYPE: &'static str = "ReconciliationDetail";
    const TABLE: &'static str = "reconciliation_details";
    const PARENT_COLUMN: &'static str = "reconciliation_id";
    const ORDER_BY: &'static str = "sequence, rowid";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.reconciliation_details (
    id TEXT PRIMARY KEY,
    reconciliation_id TEXT NOT NULL REFERENCES payment_reconciliations (id) ON DELETE CASCADE,
    type_code TEXT NOT NULL,
    amount TEXT,
    currency TEXT,
    detail_date TEXT,
    predecessor_reference TEXT,
    sequence INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS {ns}.idx_reconciliation_details_parent
    ON reconciliation_details (reconciliation_id, sequence);
";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn parent_id(&self) -> Uuid {
        self.reconciliation_id
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("reconciliation_id", self.reconciliation_id.to_sql_value()),
            ("type_code", self.type_code.to_sql_value()),
            ("amount", self.amount.to_sql_value()),
            ("currency", self.currency.to_sql_value()),
            ("detail_date", self.detail_date.to_sql_value()),
            ("predecessor_reference", self.predecessor_reference.to_sql_value()),
            ("sequence", self.sequence.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: column(row, "id")?,
            reconciliation_id: column(row, "reconciliation_id")?,
            type_code: column(row, "type_code")?,
            amount: column(row, "amount")?,
            currency: column(row, "currency")?,
            detail_date: column(row, "detail_date")?,
            predecessor_reference: column(row, "predecessor_reference")?,
            sequence: column(row, "sequence")?,
        })
    }
}

pub type PaymentReconciliationRepository = Repository<PaymentReconciliation>;

impl Repository<PaymentReconciliation> {
    pub async fn add_detail(
        &self,
        ctx: &TenantContext,
        detail: ReconciliationDetail,
    ) -> StorageResult<ReconciliationDetail> {
        self.add_child(ctx, detail).await
    }

    /// Details of a reconciliation, ordered by sequence.
    pub async fn get_details(
        &self,
        ctx: &TenantContext,
        reconciliation_id: Uuid,
    ) -> StorageResult<Vec<ReconciliationDetail>> {
        self.get_children(ctx, reconciliation_id).await
    }
}
