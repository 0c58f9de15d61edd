//! Search engine (spec §4.6): natural-language query parsing plus
//! semantic/keyword/hybrid retrieval and ranking over the store adapter.

pub mod engine;
pub mod query;

pub use engine::{search, RankedResult, SearchMode};
pub use query::{parse_natural_query, validate_query, QueryValidation, SearchFilter, SearchQuery, SearchScope, SortOrder};
