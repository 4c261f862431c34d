//! Storage backends.

pub mod sqlite;
