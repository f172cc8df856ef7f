//! Concrete query node implementations
//!
//! This module provides implementations of the `QueryNode` trait for
//! each query type.

mod all_docs;
mod bool_query;
mod boost_query;
mod exact_query;
mod facet_query;
mod phrase_query;
mod range_query;
mod term_query;

pub use all_docs::AllDocsQuery;
pub use bool_query::{BoolQuery, Occur};
pub use boost_query::BoostQuery;
pub use exact_query::ExactValueQuery;
pub use facet_query::FacetQuery;
pub use phrase_query::PhraseQuery;
pub use range_query::RangeQuery;
pub use term_query::TermQuery;
