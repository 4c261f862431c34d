//! Test infrastructure for the persistence layer.
//!
//! Each test gets its own temporary data directory with a fresh catalog, so
//! tests can run in parallel without sharing tenant databases.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
