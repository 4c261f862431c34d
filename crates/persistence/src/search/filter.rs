//! Filter keys recognized by each resource type.
//!
//! Callers pass filters as a `key -> value` map. Each resource declares a
//! closed enum of the keys it understands; the boundary parses the map into
//! that enum and silently skips anything else.

use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::ValidationError;

use super::translator::Predicate;

/// Key matching the external FHIR id, accepted by every resource type.
pub const ID_KEY: &str = "_id";

/// A closed set of filters for one resource type.
pub trait SearchFilter: Debug + Clone + Send + Sync + Sized + 'static {
    /// Parses one `key=value` pair.
    ///
    /// Returns `None` for keys this resource does not recognize, and an error
    /// for recognized keys whose value cannot be parsed.
    fn parse(key: &str, value: &str) -> Option<Result<Self, ValidationError>>;

    /// The SQL predicate for this filter.
    fn predicate(&self) -> Predicate;
}

/// Parses a filter map into predicates for resource filter type `F`.
///
/// Keys are visited in sorted order so the generated SQL is deterministic.
pub fn parse_filters<F: SearchFilter>(
    params: &HashMap<String, String>,
) -> Result<Vec<Predicate>, ValidationError> {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut predicates = Vec::with_capacity(keys.len());
    for key in keys {
        let value = &params[key];
        if key == ID_KEY {
            predicates.push(Predicate::eq("fhir_id", value.trim()));
            continue;
        }
        match F::parse(key, value) {
            Some(filter) => predicates.push(filter?.predicate()),
            None => tracing::trace!(key = %key, "ignoring unrecognized filter key"),
        }
    }
    Ok(predicates)
}
