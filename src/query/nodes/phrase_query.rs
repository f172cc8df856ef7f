//! Phrase query - matches a sequence of terms with optional slop
//!
//! A phrase query matches documents containing the terms in order. The
//! `slop` is the total number of extra positions allowed between them:
//! slop 0 requires adjacent terms.

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;

/// Query that matches an ordered sequence of terms of one field
///
/// The field must record positions; the terms come from analysing the
/// phrase text with the field's tokenizer.
#[derive(Clone, Debug)]
pub struct PhraseQuery {
    pub terms: Vec<Term>,
    pub slop: u32,
}

impl PhraseQuery {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms, slop: 0 }
    }

    /// Set the slop (extra positions allowed between terms)
    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    /// Whether the position lists contain the phrase
    ///
    /// For every start position of the first term, each following term takes
    /// its earliest position after the previous one; that choice minimizes
    /// the total gap, so the phrase matches iff some start stays within slop.
    fn positions_match(&self, positions: &[&[u32]]) -> bool {
        let Some((first, rest)) = positions.split_first() else {
            return false;
        };
        'start: for &start in first.iter() {
            let mut prev = start;
            let mut gap = 0u32;
            for list in rest {
                let idx = list.partition_point(|&p| p <= prev);
                let Some(&next) = list.get(idx) else {
                    continue 'start;
                };
                gap += next - prev - 1;
                if gap > self.slop {
                    continue 'start;
                }
                prev = next;
            }
            return true;
        }
        false
    }
}

impl QueryNode for PhraseQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let mut candidates: Option<RoaringBitmap> = None;
        for term in &self.terms {
            let docs = ctx.postings_bitmap(term)?;
            let next = match candidates {
                Some(c) => c & docs,
                None => docs,
            };
            if next.is_empty() {
                return Ok(RoaringBitmap::new());
            }
            candidates = Some(next);
        }
        let Some(candidates) = candidates else {
            return Ok(RoaringBitmap::new());
        };
        if self.terms.len() == 1 {
            return Ok(candidates);
        }

        let lists = self
            .terms
            .iter()
            .map(|term| ctx.postings(term))
            .collect::<Result<Vec<_>>>()?;
        let mut result = RoaringBitmap::new();
        for doc in candidates.iter() {
            let mut positions: Vec<&[u32]> = Vec::with_capacity(lists.len());
            for list in &lists {
                if let Ok(idx) = list.binary_search_by_key(&doc, |p| p.doc) {
                    positions.push(&list[idx].positions);
                }
            }
            if positions.len() == lists.len() && self.positions_match(&positions) {
                result.insert(doc);
            }
        }
        Ok(result)
    }

    /// Sum of the BM25 weights of the phrase terms
    fn score(&self, ctx: &QueryContext, doc: DocId) -> Result<f32> {
        let mut total = 0.0;
        for term in &self.terms {
            total += ctx.bm25_score(term, doc)?;
        }
        Ok(total)
    }

    fn collect_terms(&self, terms: &mut Vec<Term>) {
        terms.extend(self.terms.iter().cloned());
    }

    fn cache_key(&self) -> String {
        format!("phrase:{}:{:?}", self.slop, self.terms)
    }

    fn query_type(&self) -> &'static str {
        "phrase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::TestSegment;

    fn phrase(segment: &TestSegment, words: &[&str]) -> PhraseQuery {
        PhraseQuery::new(words.iter().map(|w| segment.text_term(w)).collect())
    }

    #[test]
    fn test_exact_phrase() {
        let segment = TestSegment::titles(&[
            "the quick brown fox",
            "brown quick fox",
            "quick and brown",
        ]);
        let ctx = segment.context();

        let docs = phrase(&segment, &["quick", "brown"]).execute(&ctx).unwrap();
        assert_eq!(docs.iter().collect::<Vec<_>>(), vec![0]);

        let docs = phrase(&segment, &["quick", "fox"]).execute(&ctx).unwrap();
        assert_eq!(docs.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_phrase_with_slop() {
        let segment = TestSegment::titles(&["quick and brown", "quick brown", "brown quick"]);
        let ctx = segment.context();

        let exact = phrase(&segment, &["quick", "brown"]).execute(&ctx).unwrap();
        assert_eq!(exact.iter().collect::<Vec<_>>(), vec![1]);

        let sloppy = phrase(&segment, &["quick", "brown"])
            .with_slop(1)
            .execute(&ctx)
            .unwrap();
        assert_eq!(sloppy.iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_repeated_terms() {
        let segment = TestSegment::titles(&["a b a b c", "a c"]);
        let ctx = segment.context();
        let docs = phrase(&segment, &["a", "b", "c"]).execute(&ctx).unwrap();
        assert_eq!(docs.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_positions_match() {
        let query = PhraseQuery::new(Vec::new()).with_slop(2);
        assert!(query.positions_match(&[&[0, 10], &[3]]));
        assert!(!query.positions_match(&[&[0], &[4]]));
        assert!(!query.positions_match(&[&[5], &[1]]));
        assert!(!query.positions_match(&[]));
    }
}
