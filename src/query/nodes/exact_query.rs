//! Exact value query - narrows an analysed text match to docs whose stored
//! field value equals the searched value

use crate::document::Value;
use crate::query::ast::{QueryNode, QueryNodeRef};
use crate::query::context::QueryContext;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;

#[derive(Clone, Debug)]
pub struct ExactValueQuery {
    /// Candidate matcher, usually the analysed term or phrase
    pub inner: QueryNodeRef,
    /// Stored field compared against
    pub field_name: String,
    pub value: Value,
}

impl ExactValueQuery {
    pub fn new(inner: QueryNodeRef, field_name: impl Into<String>, value: Value) -> Self {
        Self {
            inner,
            field_name: field_name.into(),
            value,
        }
    }
}

impl QueryNode for ExactValueQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let candidates = ctx.matches(self.inner.as_ref())?;
        let mut matched = RoaringBitmap::new();
        for doc in candidates.iter() {
            let stored = ctx.segment().doc(doc)?;
            if stored.get_all(&self.field_name).contains(&self.value) {
                matched.insert(doc);
            }
        }
        Ok(matched)
    }

    fn score(&self, ctx: &QueryContext, doc: DocId) -> Result<f32> {
        self.inner.score(ctx, doc)
    }

    fn collect_terms(&self, terms: &mut Vec<Term>) {
        self.inner.collect_terms(terms);
    }

    fn cache_key(&self) -> String {
        format!(
            "exact:{}:{:?}:{}",
            self.field_name,
            self.value,
            self.inner.cache_key()
        )
    }

    fn query_type(&self) -> &'static str {
        "exact"
    }
}
