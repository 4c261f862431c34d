//! Flag repository tests: the full create/read/update/delete lifecycle and
//! subject reference checks.

mod common;

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use cdr_persistence::error::StorageError;
use cdr_persistence::resources::{Flag, FlagRepository};
use cdr_persistence::search::Pagination;
use cdr_persistence::ResourceRepository;

use common::{TestBackend, create_encounter, create_patient, create_practitioner, ctx};

fn safety_flag(patient_id: Uuid) -> Flag {
    Flag {
        status: "active".to_string(),
        code_code: "SAFETY-001".to_string(),
        subject_patient_id: patient_id,
        ..Default::default()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_flag_lifecycle() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Lifecycle").await;
    let repo = FlagRepository::new(backend);

    let created = repo.create(&ctx, safety_flag(patient.meta.id)).await.unwrap();
    assert!(!created.meta.id.is_nil());
    assert!(!created.meta.fhir_id.is_empty());
    assert_eq!(created.meta.created_at, created.meta.updated_at);

    let fetched = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(fetched.status, "active");
    assert_eq!(fetched, created);

    let by_fhir_id = repo.get_by_fhir_id(&ctx, &created.meta.fhir_id).await.unwrap();
    assert_eq!(by_fhir_id, created);

    let period_end = Utc.with_ymd_and_hms(2024, 6, 30, 17, 45, 0).unwrap();
    let mut changed = fetched.clone();
    changed.status = "inactive".to_string();
    changed.period_end = Some(period_end);
    let updated = repo.update(&ctx, changed).await.unwrap();
    assert_eq!(updated.meta.id, created.meta.id);
    assert_eq!(updated.meta.fhir_id, created.meta.fhir_id);
    assert_eq!(updated.meta.created_at, created.meta.created_at);
    assert!(updated.meta.updated_at >= created.meta.updated_at);

    let refetched = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(refetched.status, "inactive");
    assert_eq!(refetched.period_end, Some(period_end));
    assert_eq!(refetched.code_code, "SAFETY-001");
    assert_eq!(refetched.subject_patient_id, patient.meta.id);

    repo.delete(&ctx, created.meta.id).await.unwrap();

    let err = repo.get_by_id(&ctx, created.meta.id).await.unwrap_err();
    assert!(err.is_not_found());
    let err = repo
        .get_by_fhir_id(&ctx, &created.meta.fhir_id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = repo.delete(&ctx, created.meta.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Resource(_)));
}

#[tokio::test]
async fn test_flag_round_trips_every_field() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Roundtrip").await;
    let encounter = create_encounter(&backend, &ctx, patient.meta.id).await;
    let author = create_practitioner(&backend, &ctx, "Author").await;
    let repo = FlagRepository::new(backend);

    let flag = Flag {
        category_code: Some("safety".to_string()),
        category_display: Some("Safety".to_string()),
        code_system: Some("http://example.org/flags".to_string()),
        code_display: Some("Fall risk".to_string()),
        encounter_id: Some(encounter.meta.id),
        author_practitioner_id: Some(author.meta.id),
        period_start: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        ..safety_flag(patient.meta.id)
    };
    let created = repo.create(&ctx, flag.clone()).await.unwrap();

    let fetched = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.category_display, flag.category_display);
    assert_eq!(fetched.encounter_id, Some(encounter.meta.id));
}

// ============================================================================
// References
// ============================================================================

#[tokio::test]
async fn test_flag_with_unknown_patient_is_rejected() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let repo = FlagRepository::new(fixture.backend());
    let ctx = ctx("t1");

    let err = repo
        .create(&ctx, safety_flag(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(err.is_referential_integrity(), "got {err:?}");

    let page = repo.list(&ctx, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_update_to_unknown_author_is_rejected() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Author").await;
    let repo = FlagRepository::new(backend);
    let created = repo.create(&ctx, safety_flag(patient.meta.id)).await.unwrap();

    let mut changed = created.clone();
    changed.author_practitioner_id = Some(Uuid::new_v4());
    let err = repo.update(&ctx, changed).await.unwrap_err();
    assert!(err.is_referential_integrity(), "got {err:?}");

    let unchanged = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(unchanged, created);
}

#[tokio::test]
async fn test_patient_with_flags_cannot_be_deleted() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Referenced").await;
    let flags = FlagRepository::new(backend.clone());
    let flag = flags.create(&ctx, safety_flag(patient.meta.id)).await.unwrap();

    let patients = cdr_persistence::resources::PatientRepository::new(backend);
    let err = patients.delete(&ctx, patient.meta.id).await.unwrap_err();
    assert!(err.is_referential_integrity(), "got {err:?}");

    flags.delete(&ctx, flag.meta.id).await.unwrap();
    patients.delete(&ctx, patient.meta.id).await.unwrap();
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_flags_by_patient_and_status() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let alice = create_patient(&backend, &ctx, "Alice").await;
    let bob = create_patient(&backend, &ctx, "Bob").await;
    let repo = FlagRepository::new(backend);

    repo.create(&ctx, safety_flag(alice.meta.id)).await.unwrap();
    repo.create(
        &ctx,
        Flag {
            status: "inactive".to_string(),
            ..safety_flag(alice.meta.id)
        },
    )
    .await
    .unwrap();
    repo.create(&ctx, safety_flag(bob.meta.id)).await.unwrap();

    let by_patient = HashMap::from([("patient".to_string(), alice.meta.id.to_string())]);
    let page = repo.search(&ctx, &by_patient, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|f| f.subject_patient_id == alice.meta.id));

    let mut active_for_alice = by_patient.clone();
    active_for_alice.insert("status".to_string(), "active".to_string());
    let page = repo
        .search(&ctx, &active_for_alice, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].status, "active");
}
