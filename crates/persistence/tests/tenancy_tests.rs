//! Tenant scope tests.
//!
//! Covers namespace isolation between tenants, unknown tenants, pool
//! exhaustion, cancellation, and connection hygiene after failures.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use cdr_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig, attached_databases};
use cdr_persistence::error::{StorageError, StorageResult};
use cdr_persistence::resources::{NamingSystem, NamingSystemRepository, PatientRepository};
use cdr_persistence::search::Pagination;
use cdr_persistence::tenant::TenantId;
use cdr_persistence::ResourceRepository;

use common::{TestBackend, create_patient, ctx};

/// Waits until every pooled connection is idle again.
async fn assert_pool_idle(backend: &SqliteBackend) {
    for _ in 0..200 {
        let state = backend.pool_state();
        if state.connections > 0 && state.idle_connections == state.connections {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pool never returned to idle: {:?}", backend.pool_state());
}

fn naming_system(name: &str) -> NamingSystem {
    NamingSystem {
        status: "active".to_string(),
        name: name.to_string(),
        kind: "identifier".to_string(),
        date: Utc::now(),
        ..Default::default()
    }
}

fn filters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn test_naming_system_invisible_to_other_tenant() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let repo = NamingSystemRepository::new(fixture.backend());

    let created = repo.create(&ctx("ta"), naming_system("X")).await.unwrap();

    let in_b = repo
        .search(&ctx("tb"), &filters(&[("name", "X")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(in_b.total, 0);
    assert!(in_b.items.is_empty());

    let in_a = repo
        .search(&ctx("ta"), &filters(&[("name", "X")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(in_a.total, 1);
    assert_eq!(in_a.items[0].meta.id, created.meta.id);
}

#[tokio::test]
async fn test_cross_tenant_probes_return_not_found() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let backend = fixture.backend();
    let patient = create_patient(&backend, &ctx("ta"), "Isolated").await;
    let repo = PatientRepository::new(backend);

    let err = repo.get_by_id(&ctx("tb"), patient.meta.id).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {err:?}");

    let err = repo
        .get_by_fhir_id(&ctx("tb"), &patient.meta.fhir_id)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {err:?}");

    let err = repo.delete(&ctx("tb"), patient.meta.id).await.unwrap_err();
    assert!(err.is_not_found());

    let listed = repo.list(&ctx("tb"), Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 0);

    // Still intact in the owning tenant.
    let fetched = repo.get_by_id(&ctx("ta"), patient.meta.id).await.unwrap();
    assert_eq!(fetched, patient);
}

#[tokio::test]
async fn test_reference_into_other_tenant_is_rejected() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let backend = fixture.backend();
    let patient = create_patient(&backend, &ctx("ta"), "Elsewhere").await;

    let flags = cdr_persistence::resources::FlagRepository::new(backend);
    let err = flags
        .create(
            &ctx("tb"),
            cdr_persistence::resources::Flag {
                status: "active".to_string(),
                code_code: "SAFETY-001".to_string(),
                subject_patient_id: patient.meta.id,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_referential_integrity(), "got {err:?}");
}

#[tokio::test]
async fn test_unknown_tenant_is_rejected() {
    let fixture = TestBackend::with_tenants(&["ta"]);
    let repo = PatientRepository::new(fixture.backend());

    let err = repo
        .list(&ctx("ghost"), Pagination::default())
        .await
        .unwrap_err();
    assert!(err.is_tenant_not_found(), "got {err:?}");

    let err = repo
        .get_by_id(&ctx("ghost"), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Tenant(_)));
}

#[tokio::test]
async fn test_deprovisioned_tenant_is_unknown() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let backend = fixture.backend();
    create_patient(&backend, &ctx("ta"), "Gone").await;

    backend
        .deprovision_tenant(&cdr_persistence::TenantId::new("ta"))
        .unwrap();

    let repo = PatientRepository::new(backend);
    let err = repo.list(&ctx("ta"), Pagination::default()).await.unwrap_err();
    assert!(err.is_tenant_not_found());
    assert!(repo.list(&ctx("tb"), Pagination::default()).await.is_ok());
}

#[tokio::test]
async fn test_tenant_removed_by_another_backend_is_unknown() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let stale = fixture.backend();
    let repo = NamingSystemRepository::new(stale.clone());
    repo.create(&ctx("ta"), naming_system("Before")).await.unwrap();

    let other = SqliteBackend::open(SqliteBackendConfig::new(fixture.dir.path())).unwrap();
    other.deprovision_tenant(&TenantId::new("ta")).unwrap();
    let db_file = fixture.dir.path().join("tenant_ta.db");
    assert!(!db_file.exists());

    for _ in 0..2 {
        let err = repo.list(&ctx("ta"), Pagination::default()).await.unwrap_err();
        assert!(err.is_tenant_not_found(), "got {err:?}");
        assert!(!db_file.exists());
    }
    assert!(repo.list(&ctx("tb"), Pagination::default()).await.is_ok());
    assert_pool_idle(&stale).await;

    stale.provision_tenant(&TenantId::new("ta")).unwrap();
    let page = repo.list(&ctx("ta"), Pagination::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_stay_in_their_namespace() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let backend = fixture.backend();

    let mut handles = Vec::new();
    for i in 0..10 {
        let backend = backend.clone();
        let tenant = if i % 2 == 0 { "ta" } else { "tb" };
        handles.push(tokio::spawn(async move {
            create_patient(&backend, &ctx(tenant), &format!("Writer{i}")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let repo = PatientRepository::new(backend);
    for tenant in ["ta", "tb"] {
        let page = repo.list(&ctx(tenant), Pagination::default()).await.unwrap();
        assert_eq!(page.total, 5, "tenant {tenant}");
    }
}

// ============================================================================
// Connection hygiene
// ============================================================================

#[tokio::test]
async fn test_only_bound_namespace_is_attached() {
    let fixture = TestBackend::with_config(&["ta", "tb"], |c| c.with_max_connections(1));
    let backend = fixture.backend();

    let attached = backend
        .with_tenant(&ctx("ta"), |session| attached_databases(session.connection()))
        .await
        .unwrap();
    assert_eq!(attached, vec!["tenant_ta".to_string()]);

    // Same pooled connection, rebound to the other tenant.
    let attached = backend
        .with_tenant(&ctx("tb"), |session| attached_databases(session.connection()))
        .await
        .unwrap();
    assert_eq!(attached, vec!["tenant_tb".to_string()]);
}

#[tokio::test]
async fn test_failed_operation_releases_connection() {
    let fixture = TestBackend::with_config(&["ta"], |c| c.with_max_connections(1));
    let backend = fixture.backend();

    let result: StorageResult<()> = backend
        .with_tenant(&ctx("ta"), |session| {
            session
                .connection()
                .execute_batch("SELECT * FROM no_such_table")?;
            Ok(())
        })
        .await;
    assert!(result.is_err());
    assert_pool_idle(&backend).await;

    let attached = backend
        .with_tenant(&ctx("ta"), |session| attached_databases(session.connection()))
        .await
        .unwrap();
    assert_eq!(attached, vec!["tenant_ta".to_string()]);
}

#[tokio::test]
async fn test_open_transaction_is_rolled_back_on_release() {
    let fixture = TestBackend::with_config(&["ta"], |c| c.with_max_connections(1));
    let backend = fixture.backend();

    backend
        .with_tenant(&ctx("ta"), |session| {
            session.connection().execute_batch(&format!(
                "BEGIN; DELETE FROM {};",
                session.table("fhir_id_ledger")
            ))?;
            Ok(())
        })
        .await
        .unwrap();

    let autocommit = backend
        .with_tenant(&ctx("ta"), |session| Ok(session.connection().is_autocommit()))
        .await
        .unwrap();
    assert!(autocommit);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panic_releases_connection() {
    let fixture = TestBackend::with_config(&["ta"], |c| c.with_max_connections(1));
    let backend = fixture.backend();

    let panicking = backend.clone();
    let joined = tokio::spawn(async move {
        panicking
            .with_tenant(&ctx("ta"), |_session| -> StorageResult<()> {
                panic!("operation blew up")
            })
            .await
    })
    .await;
    assert!(joined.unwrap_err().is_panic());
    assert_pool_idle(&backend).await;

    let attached = backend
        .with_tenant(&ctx("ta"), |session| attached_databases(session.connection()))
        .await
        .unwrap();
    assert_eq!(attached, vec!["tenant_ta".to_string()]);
}

// ============================================================================
// Pool limits and cancellation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_exhaustion_fails_acquisition() {
    let fixture = TestBackend::with_config(&["ta"], |c| c.with_max_connections(1));
    let backend = fixture.backend();

    let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
    let holder = backend.clone();
    let held = tokio::spawn(async move {
        holder
            .with_tenant(&ctx("ta"), move |_session| {
                let _ = acquired_tx.send(());
                std::thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .await
    });
    acquired_rx.await.unwrap();

    let impatient = ctx("ta").with_acquire_timeout(Duration::from_millis(50));
    let err = backend
        .with_tenant(&impatient, |_session| Ok(()))
        .await
        .unwrap_err();
    assert!(err.is_connection_acquisition_failed(), "got {err:?}");

    held.await.unwrap().unwrap();
    assert_pool_idle(&backend).await;
    backend.with_tenant(&ctx("ta"), |_session| Ok(())).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_future_interrupts_statement() {
    let fixture = TestBackend::with_config(&["ta"], |c| c.with_max_connections(1));
    let backend = fixture.backend();

    let tenant_ctx = ctx("ta");
    let endless = backend.with_tenant(&tenant_ctx, |session| {
        let count: i64 = session.connection().query_row(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) \
             SELECT count(*) FROM n",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    });
    let outcome = tokio::time::timeout(Duration::from_millis(100), endless).await;
    assert!(outcome.is_err(), "query should still be running");
    assert_pool_idle(&backend).await;

    // The interrupted connection comes back to the single-slot pool.
    let attached = backend
        .with_tenant(&ctx("ta"), |session| attached_databases(session.connection()))
        .await
        .unwrap();
    assert_eq!(attached, vec!["tenant_ta".to_string()]);
}
