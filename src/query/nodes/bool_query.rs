//! Boolean query - combines clauses with MUST, SHOULD and MUST_NOT
//!
//! - `Must`: all such clauses must match. Contributes to score.
//! - `Should`: with no must clause, at least one must match; otherwise
//!   they only add to the score of docs that match them.
//! - `MustNot`: no such clause may match. Does not contribute to score.
//!
//! A query with only must-not clauses matches every other document.

use crate::query::ast::{QueryNode, QueryNodeRef};
use crate::query::context::QueryContext;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

/// How a clause takes part in a boolean query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Clone, Debug, Default)]
pub struct BoolQuery {
    pub clauses: Vec<(Occur, QueryNodeRef)>,
}

impl BoolQuery {
    pub fn new(clauses: Vec<(Occur, QueryNodeRef)>) -> Self {
        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn clauses_with(&self, occur: Occur) -> impl Iterator<Item = &QueryNodeRef> {
        self.clauses
            .iter()
            .filter(move |(o, _)| *o == occur)
            .map(|(_, node)| node)
    }
}

impl QueryNode for BoolQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let mut result: Option<RoaringBitmap> = None;

        // Execute MUST clauses first; they bound the result
        for node in self.clauses_with(Occur::Must) {
            let matches = ctx.matches(node.as_ref())?;
            let next = match result {
                Some(r) => r & matches,
                None => matches,
            };
            if next.is_empty() {
                return Ok(next);
            }
            result = Some(next);
        }

        let mut result = match result {
            Some(r) => r,
            None => {
                let mut should_matches: Option<RoaringBitmap> = None;
                for node in self.clauses_with(Occur::Should) {
                    let matches = ctx.matches(node.as_ref())?;
                    should_matches = Some(match should_matches {
                        Some(s) => s | matches,
                        None => matches,
                    });
                }
                // Neither must nor should: everything not excluded below
                should_matches.unwrap_or_else(|| ctx.all_docs())
            }
        };

        for node in self.clauses_with(Occur::MustNot) {
            if result.is_empty() {
                break;
            }
            result -= ctx.matches(node.as_ref())?;
        }

        Ok(result)
    }

    fn score(&self, ctx: &QueryContext, doc: DocId) -> Result<f32> {
        let mut total = 0.0;
        let mut scored = false;
        for (occur, node) in &self.clauses {
            if *occur == Occur::MustNot {
                continue;
            }
            if ctx.matches(node.as_ref())?.contains(doc) {
                total += node.score(ctx, doc)?;
                scored = true;
            }
        }
        // Pure exclusion queries give their matches a constant score
        Ok(if scored { total } else { 1.0 })
    }

    fn collect_terms(&self, terms: &mut Vec<Term>) {
        for (occur, node) in &self.clauses {
            if *occur != Occur::MustNot {
                node.collect_terms(terms);
            }
        }
    }

    fn cache_key(&self) -> String {
        let clauses: Vec<String> = self
            .clauses
            .iter()
            .map(|(occur, node)| format!("{:?}={}", occur, node.cache_key()))
            .collect();
        format!("bool({})", clauses.join(","))
    }

    fn query_type(&self) -> &'static str {
        "bool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::TestSegment;
    use crate::query::nodes::TermQuery;
    use std::sync::Arc;

    fn term(segment: &TestSegment, word: &str) -> QueryNodeRef {
        Arc::new(TermQuery::new(segment.text_term(word)))
    }

    fn run(segment: &TestSegment, query: &BoolQuery) -> Vec<u32> {
        let ctx = segment.context();
        query.execute(&ctx).unwrap().iter().collect()
    }

    fn fruit() -> TestSegment {
        TestSegment::titles(&["red apple", "green apple", "red banana", "yellow banana"])
    }

    #[test]
    fn test_must_and_should() {
        let segment = fruit();
        let and = BoolQuery::new(vec![
            (Occur::Must, term(&segment, "red")),
            (Occur::Must, term(&segment, "apple")),
        ]);
        assert_eq!(run(&segment, &and), vec![0]);

        let or = BoolQuery::new(vec![
            (Occur::Should, term(&segment, "green")),
            (Occur::Should, term(&segment, "yellow")),
        ]);
        assert_eq!(run(&segment, &or), vec![1, 3]);

        // should clauses do not filter when a must clause is present
        let mixed = BoolQuery::new(vec![
            (Occur::Must, term(&segment, "banana")),
            (Occur::Should, term(&segment, "red")),
        ]);
        assert_eq!(run(&segment, &mixed), vec![2, 3]);
    }

    #[test]
    fn test_must_not() {
        let segment = fruit();
        let query = BoolQuery::new(vec![
            (Occur::Should, term(&segment, "apple")),
            (Occur::MustNot, term(&segment, "green")),
        ]);
        assert_eq!(run(&segment, &query), vec![0]);

        let only_not = BoolQuery::new(vec![(Occur::MustNot, term(&segment, "banana"))]);
        assert_eq!(run(&segment, &only_not), vec![0, 1]);

        assert_eq!(run(&segment, &BoolQuery::default()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_should_adds_to_score() {
        let segment = fruit();
        let ctx = segment.context();
        let query = BoolQuery::new(vec![
            (Occur::Must, term(&segment, "banana")),
            (Occur::Should, term(&segment, "red")),
        ]);
        let red_banana = query.score(&ctx, 2).unwrap();
        let yellow_banana = query.score(&ctx, 3).unwrap();
        assert!(red_banana > yellow_banana);
    }
}
