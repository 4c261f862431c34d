//! Behavior every resource repository shares: identity assignment, search
//! filtering and paging, update and delete semantics.
//!
//! Patients stand in for the generic contract; the per-type suites only
//! check what differs between resource types.

mod common;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use cdr_persistence::core::FhirIdAllocator;
use cdr_persistence::error::StorageError;
use cdr_persistence::resources::{
    NamingSystem, NamingSystemRepository, Patient, PatientFilter, PatientRepository,
};
use cdr_persistence::search::Pagination;
use cdr_persistence::{Repository, ResourceRepository};

use common::{TestBackend, create_patient, ctx};

fn filters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Hands out scripted candidates, then repeats the last one.
#[derive(Debug)]
struct ScriptedAllocator {
    candidates: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedAllocator {
    fn new(candidates: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            candidates: Mutex::new(candidates.iter().map(|c| c.to_string()).collect()),
            last: Mutex::new(candidates.last().copied().unwrap_or("fallback").to_string()),
        })
    }
}

impl FhirIdAllocator for ScriptedAllocator {
    fn candidate(&self, _resource_type: &str) -> String {
        match self.candidates.lock().unwrap().pop_front() {
            Some(next) => {
                *self.last.lock().unwrap() = next.clone();
                next
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_identities_are_distinct() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");

    let mut ids = HashSet::new();
    let mut fhir_ids = HashSet::new();
    for i in 0..12 {
        let patient = create_patient(&backend, &ctx, &format!("Distinct{i}")).await;
        assert!(!patient.meta.id.is_nil());
        assert!(!patient.meta.fhir_id.is_empty());
        assert_ne!(patient.meta.fhir_id, patient.meta.id.to_string());
        assert!(ids.insert(patient.meta.id));
        assert!(fhir_ids.insert(patient.meta.fhir_id));
    }
}

#[tokio::test]
async fn test_external_id_never_reused_after_delete() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let ctx = ctx("t1");
    let allocator = ScriptedAllocator::new(&["pat-1", "pat-1", "pat-2"]);
    let repo: Repository<Patient> = Repository::with_allocator(fixture.backend(), allocator);

    let first = repo
        .create(&ctx, Patient { family_name: "First".into(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(first.meta.fhir_id, "pat-1");
    repo.delete(&ctx, first.meta.id).await.unwrap();

    let second = repo
        .create(&ctx, Patient { family_name: "Second".into(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(second.meta.fhir_id, "pat-2");
}

#[tokio::test]
async fn test_exhausted_allocator_fails_create() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let ctx = ctx("t1");
    let allocator = ScriptedAllocator::new(&["only-one"]);
    let repo: Repository<Patient> = Repository::with_allocator(fixture.backend(), allocator);

    repo.create(&ctx, Patient { family_name: "Taken".into(), ..Default::default() })
        .await
        .unwrap();
    let err = repo
        .create(&ctx, Patient { family_name: "Blocked".into(), ..Default::default() })
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "got {err:?}");
}

#[tokio::test]
async fn test_same_external_id_allowed_in_other_tenant() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let allocator = ScriptedAllocator::new(&["shared"]);
    let repo: Repository<Patient> = Repository::with_allocator(fixture.backend(), allocator);

    for tenant in ["ta", "tb"] {
        let patient = repo
            .create(&ctx(tenant), Patient { family_name: "Twin".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(patient.meta.fhir_id, "shared");
    }
}

// ============================================================================
// Update and delete
// ============================================================================

#[tokio::test]
async fn test_update_changes_only_mutated_fields() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let created = create_patient(&backend, &ctx, "Before").await;
    let repo = PatientRepository::new(backend);

    let mut changed = created.clone();
    changed.family_name = "After".to_string();
    changed.birth_date = NaiveDate::from_ymd_opt(1980, 5, 17);
    let updated = repo.update(&ctx, changed).await.unwrap();

    let fetched = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(fetched, updated);
    assert_eq!(fetched.family_name, "After");
    assert_eq!(fetched.birth_date, NaiveDate::from_ymd_opt(1980, 5, 17));
    assert_eq!(fetched.given_name, created.given_name);
    assert_eq!(fetched.gender, created.gender);
    assert_eq!(fetched.meta.fhir_id, created.meta.fhir_id);
    assert_eq!(fetched.meta.created_at, created.meta.created_at);
}

#[tokio::test]
async fn test_update_cannot_rewrite_identity_or_created_at() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let created = create_patient(&backend, &ctx, "Fixed").await;
    let repo = PatientRepository::new(backend);

    let mut tampered = created.clone();
    tampered.meta.fhir_id = "forged".to_string();
    tampered.meta.created_at = chrono::DateTime::UNIX_EPOCH;
    let updated = repo.update(&ctx, tampered).await.unwrap();

    assert_eq!(updated.meta.fhir_id, created.meta.fhir_id);
    assert_eq!(updated.meta.created_at, created.meta.created_at);
}

#[tokio::test]
async fn test_update_missing_record_is_not_found() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let repo = PatientRepository::new(fixture.backend());

    let mut ghost = Patient { family_name: "Ghost".into(), ..Default::default() };
    ghost.meta.id = Uuid::new_v4();
    let err = repo.update(&ctx("t1"), ghost).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn test_update_if_match_detects_concurrent_write() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let created = create_patient(&backend, &ctx, "Contended").await;
    let repo = PatientRepository::new(backend);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut first = created.clone();
    first.mrn = Some("MRN-1".to_string());
    let winner = repo.update_if_match(&ctx, first).await.unwrap();
    assert!(winner.meta.updated_at > created.meta.updated_at);

    let mut stale = created.clone();
    stale.mrn = Some("MRN-2".to_string());
    let err = repo.update_if_match(&ctx, stale).await.unwrap_err();
    assert!(matches!(err, StorageError::Concurrency(_)), "got {err:?}");

    let stored = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(stored.mrn.as_deref(), Some("MRN-1"));

    let mut fresh = stored.clone();
    fresh.mrn = Some("MRN-3".to_string());
    let updated = repo.update_if_match(&ctx, fresh).await.unwrap();
    assert_eq!(updated.mrn.as_deref(), Some("MRN-3"));
}

#[tokio::test]
async fn test_plain_update_is_last_writer_wins() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let created = create_patient(&backend, &ctx, "Overwritten").await;
    let repo = PatientRepository::new(backend);

    let mut first = created.clone();
    first.mrn = Some("A".to_string());
    repo.update(&ctx, first).await.unwrap();

    let mut second = created.clone();
    second.mrn = Some("B".to_string());
    repo.update(&ctx, second).await.unwrap();

    let stored = repo.get_by_id(&ctx, created.meta.id).await.unwrap();
    assert_eq!(stored.mrn.as_deref(), Some("B"));
}

#[tokio::test]
async fn test_delete_is_final() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Deleted").await;
    let repo = PatientRepository::new(backend);

    repo.delete(&ctx, patient.meta.id).await.unwrap();
    assert!(repo.delete(&ctx, patient.meta.id).await.unwrap_err().is_not_found());
    assert!(repo.get_by_id(&ctx, patient.meta.id).await.unwrap_err().is_not_found());
    assert!(
        repo.get_by_fhir_id(&ctx, &patient.meta.fhir_id)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_delete_referenced_encounter_patient_refused() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Parent").await;
    common::create_encounter(&backend, &ctx, patient.meta.id).await;

    let repo = PatientRepository::new(backend);
    let err = repo.delete(&ctx, patient.meta.id).await.unwrap_err();
    assert!(err.is_referential_integrity(), "got {err:?}");
    assert!(repo.get_by_id(&ctx, patient.meta.id).await.is_ok());
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_pages_cover_all_matches_once() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    for i in 0..7 {
        create_patient(&backend, &ctx, &format!("Paged{i}")).await;
    }
    create_patient(&backend, &ctx, "Other").await;
    let repo = PatientRepository::new(backend);
    let by_family = filters(&[("family", "paged")]);

    let mut seen = Vec::new();
    let mut page = Pagination::first(3);
    loop {
        let result = repo.search(&ctx, &by_family, page).await.unwrap();
        assert_eq!(result.total, 7);
        if result.is_empty() {
            break;
        }
        assert!(result.len() <= 3);
        seen.extend(result.items.into_iter().map(|p| p.family_name));
        page = page.next();
    }

    let expected: Vec<String> = (0..7).map(|i| format!("Paged{i}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_zero_limit_uses_default_page_size() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    for i in 0..23 {
        create_patient(&backend, &ctx, &format!("Many{i}")).await;
    }
    let repo = PatientRepository::new(backend);

    let page = repo.list(&ctx, Pagination::new(0, 0)).await.unwrap();
    assert_eq!(page.total, 23);
    assert_eq!(page.len(), 20);

    let tail = repo.list(&ctx, Pagination::new(0, 20)).await.unwrap();
    assert_eq!(tail.len(), 3);
}

#[tokio::test]
async fn test_offset_past_end_is_empty() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    create_patient(&backend, &ctx, "Lonely").await;
    let repo = PatientRepository::new(backend);

    let page = repo.list(&ctx, Pagination::new(10, 50)).await.unwrap();
    assert_eq!(page.total, 1);
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_search_by_external_id() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let wanted = create_patient(&backend, &ctx, "Wanted").await;
    create_patient(&backend, &ctx, "Unwanted").await;
    let repo = PatientRepository::new(backend);

    let page = repo
        .search(&ctx, &filters(&[("_id", &wanted.meta.fhir_id)]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0], wanted);
}

#[tokio::test]
async fn test_unknown_filter_keys_are_ignored() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    create_patient(&backend, &ctx, "One").await;
    create_patient(&backend, &ctx, "Two").await;
    let repo = PatientRepository::new(backend);

    let page = repo
        .search(
            &ctx,
            &filters(&[("favourite-colour", "blue"), ("x; DROP TABLE patients", "1")]),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_filter_values_are_not_interpreted_as_sql() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    create_patient(&backend, &ctx, "O'Brien").await;
    create_patient(&backend, &ctx, "Percent").await;
    let repo = PatientRepository::new(backend);

    let page = repo
        .search(&ctx, &filters(&[("family", "o'brien")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let page = repo
        .search(&ctx, &filters(&[("family", "%")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    let page = repo
        .search(&ctx, &filters(&[("gender", "x' OR '1'='1")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_text_search_folds_non_ascii_case() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let wanted = create_patient(&backend, &ctx, "Ødegård").await;
    create_patient(&backend, &ctx, "Olsen").await;
    let repo = PatientRepository::new(backend.clone());

    for needle in ["Ødegård", "ØDEGÅRD", "ødegård", "DEGÅ"] {
        let page = repo
            .search(&ctx, &filters(&[("family", needle)]), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1, "needle {needle}");
        assert_eq!(page.items[0].meta.id, wanted.meta.id);
    }

    let systems = NamingSystemRepository::new(backend);
    let registry = systems
        .create(
            &ctx,
            NamingSystem {
                status: "active".into(),
                name: "Émile Registry".into(),
                kind: "identifier".into(),
                date: Utc::now(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for needle in ["Émile", "émile", "ÉMILE REGISTRY"] {
        let page = systems
            .search(&ctx, &filters(&[("name", needle)]), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1, "needle {needle}");
        assert_eq!(page.items[0].meta.id, registry.meta.id);
    }
}

#[tokio::test]
async fn test_invalid_filter_value_is_rejected() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let repo = PatientRepository::new(fixture.backend());
    let ctx = ctx("t1");

    for bad in [
        filters(&[("birthdate", "last tuesday")]),
        filters(&[("active", "maybe")]),
        filters(&[("gender", "   ")]),
    ] {
        let err = repo.search(&ctx, &bad, Pagination::default()).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn test_search_by_birthdate_prefix() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let repo = PatientRepository::new(backend);
    for (family, born) in [("Early", (1950, 1, 1)), ("Late", (1990, 7, 4))] {
        repo.create(
            &ctx,
            Patient {
                family_name: family.to_string(),
                birth_date: NaiveDate::from_ymd_opt(born.0, born.1, born.2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let page = repo
        .search(&ctx, &filters(&[("birthdate", "ge1970-01-01")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].family_name, "Late");

    let page = repo
        .search(&ctx, &filters(&[("birthdate", "1950-01-01")]), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].family_name, "Early");
}

#[tokio::test]
async fn test_typed_filters_match_string_filters() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let repo = PatientRepository::new(backend);
    for (family, gender, active) in [
        ("Nakamura", "female", true),
        ("Nakamoto", "male", true),
        ("Navarro", "female", false),
    ] {
        repo.create(
            &ctx,
            Patient {
                family_name: family.to_string(),
                gender: Some(gender.to_string()),
                active,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let typed = repo
        .search_with(
            &ctx,
            &[
                PatientFilter::Family("naka".to_string()),
                PatientFilter::Gender("female".to_string()),
            ],
            Pagination::default(),
        )
        .await
        .unwrap();
    let by_key = repo
        .search(
            &ctx,
            &filters(&[("family", "naka"), ("gender", "female")]),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(typed.total, 1);
    assert_eq!(typed.items[0].family_name, "Nakamura");
    assert_eq!(typed, by_key);

    let inactive = repo
        .search_with(&ctx, &[PatientFilter::Active(false)], Pagination::default())
        .await
        .unwrap();
    assert_eq!(inactive.total, 1);
    assert_eq!(inactive.items[0].family_name, "Navarro");

    let all = repo.search_with(&ctx, &[], Pagination::first(2)).await.unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.len(), 2);
}
