//! Insurance enrollment requests and the insurer's responses.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::sql::{SqlField, column};
use crate::core::{Repository, Resource, ResourceMeta};
use crate::error::ValidationError;
use crate::search::{Predicate, SearchFilter, params};

/// A request to enroll a patient with an insurer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
    pub insurer_organization_id: Option<Uuid>,
    pub provider_practitioner_id: Option<Uuid>,
    pub candidate_patient_id: Option<Uuid>,
    pub coverage_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EnrollmentRequestFilter {
    Status(String),
    Patient(Uuid),
    Insurer(Uuid),
    Provider(Uuid),
}

impl SearchFilter for EnrollmentRequestFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "status" => params::token(key, value).map(Self::Status),
            "patient" | "subject" => params::uuid(key, value).map(Self::Patient),
            "insurer" => params::uuid(key, value).map(Self::Insurer),
            "provider" => params::uuid(key, value).map(Self::Provider),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Patient(id) => Predicate::eq("candidate_patient_id", *id),
            Self::Insurer(id) => Predicate::eq("insurer_organization_id", *id),
            Self::Provider(id) => Predicate::eq("provider_practitioner_id", *id),
        }
    }
}

impl Resource for EnrollmentRequest {
    const RESOURCE_TYPE: &'static str = "EnrollmentRequest";
    const TABLE: &'static str = "enrollment_requests";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.enrollment_requests (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'cancelled', 'draft', 'entered-in-error')),
    created TEXT,
    insurer_organization_id TEXT REFERENCES organizations (id),
    provider_practitioner_id TEXT REFERENCES practitioners (id),
    candidate_patient_id TEXT REFERENCES patients (id),
    coverage_reference TEXT
);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_requests_status ON enrollment_requests (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_requests_candidate
    ON enrollment_requests (candidate_patient_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_requests_insurer
    ON enrollment_requests (insurer_organization_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_requests_provider
    ON enrollment_requests (provider_practitioner_id);
";

    type Filter = EnrollmentRequestFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("created", self.created.to_sql_value()),
            ("insurer_organization_id", self.insurer_organization_id.to_sql_value()),
            ("provider_practitioner_id", self.provider_practitioner_id.to_sql_value()),
            ("candidate_patient_id", self.candidate_patient_id.to_sql_value()),
            ("coverage_reference", self.coverage_reference.to_sql_value()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            created: column(row, "created")?,
            insurer_organization_id: column(row, "insurer_organization_id")?,
            provider_practitioner_id: column(row, "provider_practitioner_id")?,
            candidate_patient_id: column(row, "candidate_patient_id")?,
            coverage_reference: column(row, "coverage_reference")?,
        })
    }
}

pub type EnrollmentRequestRepository = Repository<EnrollmentRequest>;

/// The insurer's answer to an [`EnrollmentRequest`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub status: String,
    pub request_id: Option<Uuid>,
    /// One of `queued`, `complete`, `error`, `partial`.
    pub outcome: Option<String>,
    pub disposition: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub organization_id: Option<Uuid>,
    pub request_provider_practitioner_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum EnrollmentResponseFilter {
    Status(String),
    Request(Uuid),
    Outcome(String),
    Organization(Uuid),
}

impl SearchFilter for EnrollmentResponseFilter {
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>> {
        Some(match key {
            "status" => params::token(key, value).map(Self::Status),
            "request" => params::uuid(key, value).map(Self::Request),
            "outcome" => params::token(key, value).map(Self::Outcome),
            "organization" => params::uuid(key, value).map(Self::Organization),
            _ => return None,
        })
    }

    fn predicate(&self) -> Predicate {
        match self {
            Self::Status(status) => Predicate::eq("status", status.as_str()),
            Self::Request(id) => Predicate::eq("request_id", *id),
            Self::Outcome(outcome) => Predicate::eq("outcome", outcome.as_str()),
            Self::Organization(id) => Predicate::eq("organization_id", *id),
        }
    }
}

impl Resource for EnrollmentResponse {
    const RESOURCE_TYPE: &'static str = "EnrollmentResponse";
    const TABLE: &'static str = "enrollment_responses";
    const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS {ns}.enrollment_responses (
    id TEXT PRIMARY KEY,
    fhir_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('active', 'cancelled', 'draft', 'entered-in-error')),
    request_id TEXT REFERENCES enrollment_requests (id),
    outcome TEXT CHECK (outcome IN ('queued', 'complete', 'error', 'partial')),
    disposition TEXT,
    created TEXT,
    organization_id TEXT REFERENCES organizations (id),
    request_provider_practitioner_id TEXT REFERENCES practitioners (id)
);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_responses_status ON enrollment_responses (status);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_responses_request ON enrollment_responses (request_id);
CREATE INDEX IF NOT EXISTS {ns}.idx_enrollment_responses_organization
    ON enrollment_responses (organization_id);
";

    type Filter = EnrollmentResponseFilter;

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("status", self.status.to_sql_value()),
            ("request_id", self.request_id.to_sql_value()),
            ("outcome", self.outcome.to_sql_value()),
            ("disposition", self.disposition.to_sql_value()),
            ("created", self.created.to_sql_value()),
            ("organization_id", self.organization_id.to_sql_value()),
            (
                "request_provider_practitioner_id",
                self.request_provider_practitioner_id.to_sql_value(),
            ),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: ResourceMeta::from_row(row)?,
            status: column(row, "status")?,
            request_id: column(row, "request_id")?,
            outcome: column(row, "outcome")?,
            disposition: column(row, "disposition")?,
            created: column(row, "created")?,
            organization_id: column(row, "organization_id")?,
            request_provider_practitioner_id: column(row, "request_provider_practitioner_id")?,
        })
    }
}

pub type EnrollmentResponseRepository = Repository<EnrollmentResponse>;
