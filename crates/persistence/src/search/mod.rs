//! Search support: filter parsing, SQL translation, and pagination.
//!
//! A search request is a map of string keys to string values plus a
//! [`Pagination`]. Each resource type declares the keys it recognizes
//! through a [`SearchFilter`] enum; recognized filters become [`Predicate`]s
//! that are ANDed together by the [`SearchTranslator`]. Unrecognized keys
//! are ignored.

mod filter;
pub mod params;
mod pagination;
mod translator;

pub use filter::{ID_KEY, SearchFilter, parse_filters};
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, Pagination};
pub use params::{Comparator, DateParam, NumberParam};
pub use translator::{Predicate, SearchTranslator, SqlFragment};

pub(crate) use translator::{FOLD_FUNCTION, escape_like, fold_case, like_pattern, register_functions};
