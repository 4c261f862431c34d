//! Core abstractions: record shapes, identity allocation, column encoding
//! and the repository contract.

pub mod identity;
mod repository;
mod resource;
pub mod sql;

pub use identity::{FhirIdAllocator, MAX_ALLOCATION_ATTEMPTS, RandomFhirIdAllocator};
pub use repository::{Repository, ResourceRepository};
pub use resource::{ChildRecord, Resource, ResourceMeta};
