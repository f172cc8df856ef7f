//! Boost query - scales the score of an inner query

use crate::query::ast::{QueryNode, QueryNodeRef};
use crate::query::context::QueryContext;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;

#[derive(Clone, Debug)]
pub struct BoostQuery {
    pub inner: QueryNodeRef,
    pub boost: f32,
}

impl BoostQuery {
    pub fn new(inner: QueryNodeRef, boost: f32) -> Self {
        Self { inner, boost }
    }
}

impl QueryNode for BoostQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        ctx.matches(self.inner.as_ref())
    }

    fn score(&self, ctx: &QueryContext, doc: DocId) -> Result<f32> {
        Ok(self.inner.score(ctx, doc)? * self.boost)
    }

    fn collect_terms(&self, terms: &mut Vec<Term>) {
        self.inner.collect_terms(terms);
    }

    fn cache_key(&self) -> String {
        format!("boost:{}:{}", self.boost, self.inner.cache_key())
    }

    fn query_type(&self) -> &'static str {
        "boost"
    }
}
