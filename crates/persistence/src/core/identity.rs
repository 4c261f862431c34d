//! External identity allocation.
//!
//! Every resource gets an external FHIR id next to its internal UUID. The
//! two are generated independently: knowing one never reveals the other.
//! Allocators only propose candidates; the backend reserves each candidate in
//! an append-only per-namespace ledger, so an id that was ever handed out is
//! never handed out again, even after the resource is deleted.

use std::fmt::Debug;

use uuid::Uuid;

/// Number of candidates tried before allocation gives up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// Proposes external ids for new resources.
pub trait FhirIdAllocator: Send + Sync + Debug {
    /// Returns a candidate id for a new resource of `resource_type`.
    ///
    /// Candidates must match the FHIR id grammar `[A-Za-z0-9\-\.]{1,64}`.
    fn candidate(&self, resource_type: &str) -> String;
}

/// Random 32-character hexadecimal ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomFhirIdAllocator;

impl FhirIdAllocator for RandomFhirIdAllocator {
    fn candidate(&self, _resource_type: &str) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Returns `true` if `id` satisfies the FHIR id grammar.
pub fn is_valid_fhir_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_candidates_are_valid_and_distinct() {
        let allocator = RandomFhirIdAllocator;
        let a = allocator.candidate("Flag");
        let b = allocator.candidate("Flag");
        assert!(is_valid_fhir_id(&a));
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fhir_id_grammar() {
        assert!(is_valid_fhir_id("abc-123.x"));
        assert!(!is_valid_fhir_id(""));
        assert!(!is_valid_fhir_id("has space"));
        assert!(!is_valid_fhir_id(&"a".repeat(65)));
    }
}
