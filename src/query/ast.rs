//! Query node tree
//!
//! This module defines the core `QueryNode` trait that all query types
//! implement. A node is evaluated one segment at a time against a
//! [`QueryContext`].

use roaring::RoaringBitmap;
use std::fmt::Debug;
use std::sync::Arc;

use super::context::QueryContext;
use crate::segment::{DocId, Term};
use crate::Result;

/// Reference-counted query node for cheap tree sharing
pub type QueryNodeRef = Arc<dyn QueryNode>;

/// Core trait for all query nodes
///
/// Query nodes form a tree that represents the logical structure of a
/// search. Each node can be executed against a segment's `QueryContext` to
/// produce the set of matching doc ids.
pub trait QueryNode: Send + Sync + Debug {
    /// Matching doc ids of the context's segment, deleted docs included
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap>;

    /// Score of a doc this node matched
    fn score(&self, ctx: &QueryContext, doc: DocId) -> Result<f32>;

    /// Terms whose statistics the score depends on
    fn collect_terms(&self, _terms: &mut Vec<Term>) {}

    /// Stable key for caching results within one context
    fn cache_key(&self) -> String;

    fn query_type(&self) -> &'static str;
}

/// A query that matches no documents
#[derive(Clone, Debug, Default)]
pub struct EmptyQuery;

impl QueryNode for EmptyQuery {
    fn execute(&self, _ctx: &QueryContext) -> Result<RoaringBitmap> {
        Ok(RoaringBitmap::new())
    }

    fn score(&self, _ctx: &QueryContext, _doc: DocId) -> Result<f32> {
        Ok(0.0)
    }

    fn cache_key(&self) -> String {
        "empty".to_string()
    }

    fn query_type(&self) -> &'static str {
        "empty"
    }
}
