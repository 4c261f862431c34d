//! Concrete resource types.
//!
//! Each module defines a record struct, its closed filter enum, and the
//! table DDL. All of them share the generic [`Repository`](crate::core::Repository),
//! exposed per type through an alias such as [`FlagRepository`]. Types that
//! own sub-records (observation components, protocol drugs, ...) add typed
//! child accessors on their repository.
//!
//! | Group | Types |
//! |-------|-------|
//! | Reference targets | Patient, Practitioner, Organization, Encounter, Medication |
//! | Clinical | Flag, DetectedIssue, AdverseEvent, ClinicalImpression, RiskAssessment, Condition, Observation, AllergyIntolerance, MedicationStatement |
//! | Financial | Account, InsurancePlan, PaymentNotice, PaymentReconciliation, ChargeItem, Contract, EnrollmentRequest, EnrollmentResponse |
//! | Definitional | NamingSystem, OperationDefinition, MessageDefinition, MessageHeader |
//! | Oncology | CancerDiagnosis, TreatmentProtocol, ChemotherapyCycle, RadiationTherapy |

mod account;
mod adverse_event;
mod allergy_intolerance;
mod cancer_diagnosis;
mod charge_item;
mod chemotherapy_cycle;
mod clinical_impression;
mod condition;
mod contract;
mod detected_issue;
mod encounter;
mod enrollment;
mod flag;
mod insurance_plan;
mod medication;
mod medication_statement;
mod messaging;
mod naming_system;
mod observation;
mod operation_definition;
mod organization;
mod patient;
mod payment_notice;
mod payment_reconciliation;
mod practitioner;
mod radiation_therapy;
mod risk_assessment;
mod treatment_protocol;

use crate::core::{ChildRecord, Resource};

pub use account::{Account, AccountFilter, AccountRepository};
pub use adverse_event::{AdverseEvent, AdverseEventFilter, AdverseEventRepository};
pub use allergy_intolerance::{
    AllergyIntolerance, AllergyIntoleranceFilter, AllergyIntoleranceRepository, AllergyReaction,
};
pub use cancer_diagnosis::{CancerDiagnosis, CancerDiagnosisFilter, CancerDiagnosisRepository};
pub use charge_item::{ChargeItem, ChargeItemFilter, ChargeItemRepository};
pub use chemotherapy_cycle::{
    ChemoAdministration, ChemotherapyCycle, ChemotherapyCycleFilter, ChemotherapyCycleRepository,
};
pub use clinical_impression::{
    ClinicalImpression, ClinicalImpressionFilter, ClinicalImpressionRepository,
};
pub use condition::{Condition, ConditionFilter, ConditionRepository};
pub use contract::{Contract, ContractFilter, ContractRepository};
pub use detected_issue::{DetectedIssue, DetectedIssueFilter, DetectedIssueRepository};
pub use encounter::{Encounter, EncounterFilter, EncounterRepository};
pub use enrollment::{
    EnrollmentRequest, EnrollmentRequestFilter, EnrollmentRequestRepository, EnrollmentResponse,
    EnrollmentResponseFilter, EnrollmentResponseRepository,
};
pub use flag::{Flag, FlagFilter, FlagRepository};
pub use insurance_plan::{InsurancePlan, InsurancePlanFilter, InsurancePlanRepository};
pub use medication::{Medication, MedicationFilter, MedicationRepository};
pub use medication_statement::{
    MedicationStatement, MedicationStatementFilter, MedicationStatementRepository,
};
pub use messaging::{
    MessageDefinition, MessageDefinitionFilter, MessageDefinitionRepository, MessageHeader,
    MessageHeaderFilter, MessageHeaderRepository,
};
pub use naming_system::{
    NamingSystem, NamingSystemFilter, NamingSystemRepository, NamingSystemUniqueId,
};
pub use observation::{
    Observation, ObservationComponent, ObservationFilter, ObservationRepository,
};
pub use operation_definition::{
    OperationDefinition, OperationDefinitionFilter, OperationDefinitionRepository,
    OperationParameter,
};
pub use organization::{Organization, OrganizationFilter, OrganizationRepository};
pub use patient::{Patient, PatientFilter, PatientRepository};
pub use payment_notice::{PaymentNotice, PaymentNoticeFilter, PaymentNoticeRepository};
pub use payment_reconciliation::{
    PaymentReconciliation, PaymentReconciliationFilter, PaymentReconciliationRepository,
    ReconciliationDetail,
};
pub use practitioner::{Practitioner, PractitionerFilter, PractitionerRepository};
pub use radiation_therapy::{
    RadiationSession, RadiationTherapy, RadiationTherapyFilter, RadiationTherapyRepository,
};
pub use risk_assessment::{RiskAssessment, RiskAssessmentFilter, RiskAssessmentRepository};
pub use treatment_protocol::{
    TreatmentProtocol, TreatmentProtocolDrug, TreatmentProtocolFilter,
    TreatmentProtocolRepository,
};

/// Table DDL for every resource and child record. Referenced tables come
/// before the tables that point at them.
pub(crate) const SCHEMAS: &[&str] = &[
    Patient::SCHEMA,
    Practitioner::SCHEMA,
    Organization::SCHEMA,
    Encounter::SCHEMA,
    Medication::SCHEMA,
    Flag::SCHEMA,
    DetectedIssue::SCHEMA,
    AdverseEvent::SCHEMA,
    ClinicalImpression::SCHEMA,
    RiskAssessment::SCHEMA,
    Account::SCHEMA,
    InsurancePlan::SCHEMA,
    PaymentNotice::SCHEMA,
    PaymentReconciliation::SCHEMA,
    <ReconciliationDetail as ChildRecord>::SCHEMA,
    ChargeItem::SCHEMA,
    Contract::SCHEMA,
    EnrollmentRequest::SCHEMA,
    EnrollmentResponse::SCHEMA,
    NamingSystem::SCHEMA,
    <NamingSystemUniqueId as ChildRecord>::SCHEMA,
    OperationDefinition::SCHEMA,
    <OperationParameter as ChildRecord>::SCHEMA,
    MessageDefinition::SCHEMA,
    MessageHeader::SCHEMA,
    Condition::SCHEMA,
    Observation::SCHEMA,
    <ObservationComponent as ChildRecord>::SCHEMA,
    AllergyIntolerance::SCHEMA,
    <AllergyReaction as ChildRecord>::SCHEMA,
    MedicationStatement::SCHEMA,
    CancerDiagnosis::SCHEMA,
    TreatmentProtocol::SCHEMA,
    <TreatmentProtocolDrug as ChildRecord>::SCHEMA,
    ChemotherapyCycle::SCHEMA,
    <ChemoAdministration as ChildRecord>::SCHEMA,
    RadiationTherapy::SCHEMA,
    <RadiationSession as ChildRecord>::SCHEMA,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn created_tables() -> Vec<String> {
        SCHEMAS
            .iter()
            .flat_map(|ddl| ddl.lines())
            .filter_map(|line| line.trim().strip_prefix("CREATE TABLE IF NOT EXISTS {ns}."))
            .map(|rest| rest.split_whitespace().next().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_table_names_are_unique() {
        let tables = created_tables();
        let unique: HashSet<_> = tables.iter().collect();
        assert_eq!(unique.len(), tables.len());
        assert_eq!(tables.len(), 38);
    }

    #[test]
    fn test_references_point_at_earlier_tables() {
        let mut seen = HashSet::new();
        for ddl in SCHEMAS {
            for line in ddl.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("CREATE TABLE IF NOT EXISTS {ns}.") {
                    let table = rest.split_whitespace().next().unwrap_or_default();
                    seen.insert(table.to_string());
                }
                if let Some((_, rest)) = line.split_once("REFERENCES ") {
                    let target = rest.split_whitespace().next().unwrap_or_default();
                    assert!(seen.contains(target), "{target} referenced before creation");
                }
            }
        }
    }

    #[test]
    fn test_every_table_constant_has_ddl() {
        let tables: HashSet<String> = created_tables().into_iter().collect();
        for table in [
            Flag::TABLE,
            NamingSystem::TABLE,
            <ObservationComponent as ChildRecord>::TABLE,
            <RadiationSession as ChildRecord>::TABLE,
        ] {
            assert!(tables.contains(table), "missing DDL for {table}");
        }
    }
}
