//! Owned sub-record tests: insertion, ordering, parent checks and cascade
//! on parent delete.

mod common;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use cdr_persistence::resources::*;
use cdr_persistence::ResourceRepository;

use common::{TestBackend, create_patient, ctx};

// ============================================================================
// Observation components
// ============================================================================

#[tokio::test]
async fn test_observation_components_in_insertion_order() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Pressure").await;
    let repo = ObservationRepository::new(backend);

    let observation = repo
        .create(
            &ctx,
            Observation {
                status: "final".into(),
                code_code: "85354-9".into(),
                code_display: Some("Blood pressure panel".into()),
                patient_id: patient.meta.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    for (code, value) in [("8480-6", 128.0), ("8462-4", 82.0)] {
        let added = repo
            .add_component(
                &ctx,
                ObservationComponent {
                    observation_id: observation.meta.id,
                    code_code: code.into(),
                    value_quantity: Some(value),
                    value_unit: Some("mm[Hg]".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!added.id.is_nil());
    }

    let components = repo.get_components(&ctx, observation.meta.id).await.unwrap();
    let codes: Vec<_> = components.iter().map(|c| c.code_code.as_str()).collect();
    assert_eq!(codes, ["8480-6", "8462-4"]);
    assert_eq!(components[0].value_quantity, Some(128.0));
}

#[tokio::test]
async fn test_children_removed_with_parent() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Cascade").await;
    let repo = ObservationRepository::new(backend);

    let observation = repo
        .create(
            &ctx,
            Observation {
                status: "final".into(),
                code_code: "85354-9".into(),
                patient_id: patient.meta.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    repo.add_component(
        &ctx,
        ObservationComponent {
            observation_id: observation.meta.id,
            code_code: "8480-6".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    repo.delete(&ctx, observation.meta.id).await.unwrap();
    let components = repo.get_components(&ctx, observation.meta.id).await.unwrap();
    assert!(components.is_empty());
}

#[tokio::test]
async fn test_child_of_missing_parent_is_rejected() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let repo = ObservationRepository::new(fixture.backend());

    let err = repo
        .add_component(
            &ctx("t1"),
            ObservationComponent {
                observation_id: Uuid::new_v4(),
                code_code: "8480-6".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_referential_integrity(), "got {err:?}");
}

#[tokio::test]
async fn test_unknown_parent_has_no_children() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let repo = AllergyIntoleranceRepository::new(fixture.backend());

    let reactions = repo.get_reactions(&ctx("t1"), Uuid::new_v4()).await.unwrap();
    assert!(reactions.is_empty());
}

#[tokio::test]
async fn test_children_are_tenant_scoped() {
    let fixture = TestBackend::with_tenants(&["ta", "tb"]);
    let backend = fixture.backend();
    let repo = NamingSystemRepository::new(backend);

    let system = repo
        .create(
            &ctx("ta"),
            NamingSystem {
                status: "active".into(),
                name: "Scoped".into(),
                kind: "identifier".into(),
                date: Utc::now(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    repo.add_unique_id(
        &ctx("ta"),
        NamingSystemUniqueId {
            naming_system_id: system.meta.id,
            id_type: "uri".into(),
            value: "http://example.org/mrn".into(),
            preferred: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(repo.get_unique_ids(&ctx("ta"), system.meta.id).await.unwrap().len(), 1);
    assert!(repo.get_unique_ids(&ctx("tb"), system.meta.id).await.unwrap().is_empty());

    let err = repo
        .add_unique_id(
            &ctx("tb"),
            NamingSystemUniqueId {
                naming_system_id: system.meta.id,
                id_type: "oid".into(),
                value: "2.16.840.1.113883.4.1".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_referential_integrity());
}

// ============================================================================
// Sequenced children
// ============================================================================

#[tokio::test]
async fn test_operation_parameters_ordered_by_sequence() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let repo = OperationDefinitionRepository::new(fixture.backend());
    let ctx = ctx("t1");

    let operation = repo
        .create(
            &ctx,
            OperationDefinition {
                name: "Validate".into(),
                status: "active".into(),
                kind: "operation".into(),
                code: "validate".into(),
                type_level: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    for (name, sequence) in [("return", 3), ("resource", 1), ("mode", 2)] {
        repo.add_parameter(
            &ctx,
            OperationParameter {
                operation_definition_id: operation.meta.id,
                name: name.into(),
                param_use: if name == "return" { "out" } else { "in" }.into(),
                min: 0,
                max: "1".into(),
                sequence,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let names: Vec<_> = repo
        .get_parameters(&ctx, operation.meta.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["resource", "mode", "return"]);
}

#[tokio::test]
async fn test_protocol_drugs_and_reconciliation_details() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");

    let protocols = TreatmentProtocolRepository::new(backend.clone());
    let protocol = protocols
        .create(
            &ctx,
            TreatmentProtocol {
                status: "active".into(),
                name: "FOLFOX".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for (drug, sequence) in [("Fluorouracil", 3), ("Oxaliplatin", 1), ("Leucovorin", 2)] {
        protocols
            .add_drug(
                &ctx,
                TreatmentProtocolDrug {
                    protocol_id: protocol.meta.id,
                    drug_name: drug.into(),
                    cycle_days: Some("1".into()),
                    sequence,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    let drugs: Vec<_> = protocols
        .get_drugs(&ctx, protocol.meta.id)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.drug_name)
        .collect();
    assert_eq!(drugs, ["Oxaliplatin", "Leucovorin", "Fluorouracil"]);

    let reconciliations = PaymentReconciliationRepository::new(backend);
    let reconciliation = reconciliations
        .create(
            &ctx,
            PaymentReconciliation {
                status: "active".into(),
                created: Utc::now(),
                payment_date: chrono::NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
                payment_amount: Decimal::new(30000, 2),
                currency: "USD".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for (sequence, cents) in [(2, 10000), (1, 20000)] {
        reconciliations
            .add_detail(
                &ctx,
                ReconciliationDetail {
                    reconciliation_id: reconciliation.meta.id,
                    type_code: "payment".into(),
                    amount: Some(Decimal::new(cents, 2)),
                    sequence,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    let details = reconciliations
        .get_details(&ctx, reconciliation.meta.id)
        .await
        .unwrap();
    let total: Decimal = details.iter().filter_map(|d| d.amount).sum();
    assert_eq!(total, reconciliation.payment_amount);
}

// ============================================================================
// Oncology children
// ============================================================================

#[tokio::test]
async fn test_chemo_administrations_and_radiation_sessions() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Treated").await;

    let cycles = ChemotherapyCycleRepository::new(backend.clone());
    let cycle = cycles
        .create(
            &ctx,
            ChemotherapyCycle {
                status: "in-progress".into(),
                patient_id: patient.meta.id,
                cycle_number: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let administered = cycles
        .add_administration(
            &ctx,
            ChemoAdministration {
                cycle_id: cycle.meta.id,
                drug_name: "Oxaliplatin".into(),
                dose: 85.0,
                dose_unit: "mg/m2".into(),
                route: Some("IV".into()),
                administered_at: Utc.with_ymd_and_hms(2024, 2, 15, 10, 0, 0).unwrap(),
                infusion_minutes: Some(120),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let stored = cycles.get_administrations(&ctx, cycle.meta.id).await.unwrap();
    assert_eq!(stored, vec![administered]);

    let err = cycles
        .add_administration(
            &ctx,
            ChemoAdministration {
                cycle_id: cycle.meta.id,
                drug_name: "Oxaliplatin".into(),
                dose: -1.0,
                dose_unit: "mg/m2".into(),
                administered_at: Utc::now(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "got {err:?}");

    let therapies = RadiationTherapyRepository::new(backend);
    let therapy = therapies
        .create(
            &ctx,
            RadiationTherapy {
                status: "in-progress".into(),
                patient_id: patient.meta.id,
                treatment_site: "Pelvis".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    for number in [2, 1] {
        therapies
            .add_session(
                &ctx,
                RadiationSession {
                    radiation_therapy_id: therapy.meta.id,
                    session_number: number,
                    session_at: Utc.with_ymd_and_hms(2024, 5, number as u32, 9, 0, 0).unwrap(),
                    dose_gy: 1.8,
                    completed: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    let numbers: Vec<_> = therapies
        .get_sessions(&ctx, therapy.meta.id)
        .await
        .unwrap()
        .iter()
        .map(|s| s.session_number)
        .collect();
    assert_eq!(numbers, [1, 2]);

    therapies.delete(&ctx, therapy.meta.id).await.unwrap();
    assert!(therapies.get_sessions(&ctx, therapy.meta.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_allergy_reactions_round_trip() {
    let fixture = TestBackend::with_tenants(&["t1"]);
    let backend = fixture.backend();
    let ctx = ctx("t1");
    let patient = create_patient(&backend, &ctx, "Hives").await;
    let repo = AllergyIntoleranceRepository::new(backend);

    let allergy = repo
        .create(
            &ctx,
            AllergyIntolerance {
                code_code: "227493005".into(),
                code_display: Some("Cashew nuts".into()),
                category: Some("food".into()),
                patient_id: patient.meta.id,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let reaction = repo
        .add_reaction(
            &ctx,
            AllergyReaction {
                allergy_intolerance_id: allergy.meta.id,
                manifestation_code: "247472004".into(),
                manifestation_display: Some("Hives".into()),
                severity: Some("moderate".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reactions = repo.get_reactions(&ctx, allergy.meta.id).await.unwrap();
    assert_eq!(reactions, vec![reaction]);
}
