//! Query tree and query string parsing
//!
//! A [`Query`] is an immutable tree of [`QueryNode`]s. Each node evaluates
//! against one segment at a time through a [`QueryContext`], which carries
//! the searcher-wide term statistics used for BM25 scoring:
//! - Term and phrase queries (scored)
//! - Range, facet and all-docs queries (constant score)
//! - Boolean composition and boosting
//!
//! Query strings are parsed with [`parse_query`] or a [`QueryParser`].

pub mod ast;
pub mod context;
pub mod nodes;
pub mod query_string;
mod tree;

pub use ast::{QueryNode, QueryNodeRef};
pub use context::{GlobalStats, QueryContext};
pub use nodes::{
    AllDocsQuery, BoolQuery, BoostQuery, ExactValueQuery, FacetQuery, Occur, PhraseQuery,
    RangeQuery, TermQuery,
};
pub use query_string::{parse_query, QueryParser};
pub use tree::Query;
