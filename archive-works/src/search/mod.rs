//! Search-query normalization and compilation
//!
//! Turns a free-text search string plus structured filter parameters into a
//! canonical `SearchQuery` for the external index, and fronts the index with
//! an optional read-through cache.

pub mod normalizer;
pub mod owner;
pub mod query;
pub mod service;

pub use normalizer::normalize;
pub use query::{
    CompareOp, CountFilter, CountableField, SearchParams, SearchQuery, SortColumn, SortDirection,
};
pub use service::{SearchIndex, SearchResults, SearchService};
