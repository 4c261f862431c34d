//! Backend and record fixtures.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use cdr_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};
use cdr_persistence::resources::{
    Encounter, EncounterRepository, Organization, OrganizationRepository, Patient,
    PatientRepository, Practitioner, PractitionerRepository,
};
use cdr_persistence::tenant::{TenantContext, TenantId};
use cdr_persistence::ResourceRepository;

/// A backend rooted in a temporary directory that lives as long as the
/// fixture.
pub struct TestBackend {
    pub backend: SqliteBackend,
    pub dir: TempDir,
}

impl TestBackend {
    /// Opens a backend and provisions `tenants`.
    pub fn with_tenants(tenants: &[&str]) -> Self {
        Self::with_config(tenants, |config| config)
    }

    /// Opens a backend with a customized configuration.
    pub fn with_config(
        tenants: &[&str],
        customize: impl FnOnce(SqliteBackendConfig) -> SqliteBackendConfig,
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = customize(
            SqliteBackendConfig::new(dir.path())
                .with_max_connections(4)
                .with_acquire_timeout(Duration::from_secs(5)),
        );
        let backend = SqliteBackend::open(config).expect("failed to open backend");
        for tenant in tenants {
            backend
                .provision_tenant(&TenantId::new(*tenant))
                .expect("failed to provision tenant");
        }
        Self { backend, dir }
    }

    pub fn backend(&self) -> SqliteBackend {
        self.backend.clone()
    }
}

pub fn ctx(tenant: &str) -> TenantContext {
    TenantContext::new(tenant)
}

pub async fn create_patient(backend: &SqliteBackend, ctx: &TenantContext, family: &str) -> Patient {
    PatientRepository::new(backend.clone())
        .create(
            ctx,
            Patient {
                family_name: family.to_string(),
                given_name: Some("Alex".to_string()),
                gender: Some("unknown".to_string()),
                active: true,
                ..Default::default()
            },
        )
        .await
        .expect("failed to create patient")
}

pub async fn create_practitioner(
    backend: &SqliteBackend,
    ctx: &TenantContext,
    family: &str,
) -> Practitioner {
    PractitionerRepository::new(backend.clone())
        .create(
            ctx,
            Practitioner {
                family_name: family.to_string(),
                active: true,
                ..Default::default()
            },
        )
        .await
        .expect("failed to create practitioner")
}

pub async fn create_organization(
    backend: &SqliteBackend,
    ctx: &TenantContext,
    name: &str,
) -> Organization {
    OrganizationRepository::new(backend.clone())
        .create(
            ctx,
            Organization {
                name: name.to_string(),
                active: true,
                ..Default::default()
            },
        )
        .await
        .expect("failed to create organization")
}

pub async fn create_encounter(
    backend: &SqliteBackend,
    ctx: &TenantContext,
    patient_id: Uuid,
) -> Encounter {
    EncounterRepository::new(backend.clone())
        .create(
            ctx,
            Encounter {
                status: "finished".to_string(),
                class_code: "AMB".to_string(),
                patient_id,
                period_start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
                ..Default::default()
            },
        )
        .await
        .expect("failed to create encounter")
}
