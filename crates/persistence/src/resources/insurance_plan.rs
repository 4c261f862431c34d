use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{Predicate, SearchFilter, params};

/// A health insurance product offered by an organization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsurancePlan {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub type_code: Option<String>,
    pub name: String,
    pub alias: Option<String>,
    pub owned_by_organization_id: Option<Uuid>,
    pub administered_by_organization_id: Option<Uuid>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub coverage_area: Option<String>,
}

#[derive(Debug, Clone)]
pub enum InsurancePlanFilter {
    Name(String),
    Status(String),
    Type(String),
    OwnedBy(Uuid),
    AdministeredBy(Uuid),
}

impl SearchFilter for InsurancePlanFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "name" => params::token(key, value).map(Self::Name),
            "status" => params::token(key, value).map(Self::Status),
            "type" => params::token(key, value).map(Self::Type),
            "owned-by" => params::uuid(key, value).map(Self::OwnedBy),
            "administered-by" => params::uuid(key, value).map(Self::AdministeredBy),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Name(name) => Predicate::text(&["name", "alias"], name.as_str()),
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Type(type_code) => Predicate::eq("type_code", type_code.as_str()),
            Self::OwnedBy(id) => Predicate::eq("owned_by_organization_id", *id),
            Self::AdministeredBy(id) => Predicate::eq("administered_by_organization_id", *id),
        }
    }
}

impl Resource for InsurancePlan {
    const RESOURCE_TYPE: &'static str = "InsurancePlan";
    const TABLE: &'static str = "insurance_plans";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.insurance_plans (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'active', 'retired', 'unknown')),
    type_code TEXT,
    name TEXT NOT NULL,
    alias TEXT,
    owned_by_organization_id TEXT REFERENCES organizations (id),
    administered_by_organization_id TEXT REFERENCES organizations (id),
    period_start TEXT,
    period_end TEXT,
    coverage_area TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_insurance_plans_status ON insurance_plans (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_insurance_plans_owner ON insurance_plans (owned_by_organization_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_insurance_plans_administrator
    ON insurance_plans (administered_by_organization_id);
";

    type Filter = InsurancePlanFilter;

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
            ("alias", self.alias.to_sql_value()),
            ("owned_by_organization_id", self.owned_by_organization_id.to_sql_value()),
            (
                "administered_by_organization_id",
                self.administered_by_organization_id.to_sql_value(),
            ),
            ("period_start", self.period_start.to_sql_value()),
            ("period_end", self.period_end.to_sql_value()),
            ("coverage_area", self.coverage_area.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            type_code: column(row, "type_code")?,
            name: column(row, "name")?,
            alias: column(row, "alias")?,
            owned_by_organization_id: column(row, "owned_by_organization_id")?,
            administered_by_organization_id: column(row, "administered_by_organization_id")?,
            period_start: column(row, "period_start")?,
            period_end: column(row, "period_end")?,
            coverage_area: column(row, "coverage_area")?,
        })
    }
}

pub type InsurancePlanRepository = Repository<InsurancePlan>;
