//! Term query - exact match of one indexed term

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;

/// Query that matches documents containing an exact term
///
/// This is the most basic query type: it looks the term up in the term
/// dictionary and returns its posting list as a bitmap. Scores are BM25.
#[derive(Clone, Debug)]
pub struct TermQuery {
    pub term: Term,
}

impl TermQuery {
    pub fn new(term: Term) -> Self {
        Self { term }
    }
}

impl QueryNode for TermQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        ctx.postings_bitmap(&self.term)
    }

    fn score(&self, ctx: &QueryContext, doc: DocId) -> Result<f32> {
        ctx.bm25_score(&self.term, doc)
    }

    fn collect_terms(&self, terms: &mut Vec<Term>) {
        terms.push(self.term.clone());
    }

    fn cache_key(&self) -> String {
        format!("term:{:?}", self.term)
    }

    fn query_type(&self) -> &'static str {
        "term"
    }
}
