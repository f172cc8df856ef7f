//! Range query - matches indexed values between two bounds
//!
//! Numeric and date terms are encoded order-preserving, so a range is a
//! plain byte range over the field's slice of the term dictionary.

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::schema::Field;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;
use std::ops::Bound;

/// Query that matches documents with a term of `field` inside the bounds
///
/// Range matches are not scored by relevance; every hit scores 1.
#[derive(Clone, Debug)]
pub struct RangeQuery {
    pub field: Field,
    pub lower: Bound<Term>,
    pub upper: Bound<Term>,
}

impl RangeQuery {
    pub fn new(field: Field, lower: Bound<Term>, upper: Bound<Term>) -> Self {
        Self {
            field,
            lower,
            upper,
        }
    }

    /// First key past every term of the field
    fn field_end(&self) -> Option<Term> {
        self.field
            .field_id()
            .checked_add(1)
            .map(|next| Term::field_start(Field::from_field_id(next)))
    }
}

fn bound_key(bound: &Bound<Term>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(term) => Bound::Included(term.as_bytes()),
        Bound::Excluded(term) => Bound::Excluded(term.as_bytes()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl QueryNode for RangeQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let start = Term::field_start(self.field);
        let end = self.field_end();

        let lower = match &self.lower {
            Bound::Unbounded => Bound::Included(start.as_bytes()),
            bound => bound_key(bound),
        };
        let upper = match (&self.upper, &end) {
            (Bound::Unbounded, Some(end)) => Bound::Excluded(end.as_bytes()),
            (bound, _) => bound_key(bound),
        };

        let segment = ctx.segment();
        let mut result = RoaringBitmap::new();
        for (term, meta) in segment.terms().range(lower, upper) {
            if term.field() != self.field {
                continue;
            }
            for posting in segment.read_postings(&term, meta)? {
                result.insert(posting.doc);
            }
        }
        Ok(result)
    }

    fn score(&self, _ctx: &QueryContext, _doc: DocId) -> Result<f32> {
        Ok(1.0)
    }

    fn cache_key(&self) -> String {
        format!(
            "range:{}:{:?}:{:?}",
            self.field.field_id(),
            self.lower,
            self.upper
        )
    }

    fn query_type(&self) -> &'static str {
        "range"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::query::nodes::test_util::TestSegment;
    use crate::schema::{NumericOptions, Schema, TextOptions};

    fn segment() -> (TestSegment, Field, Field) {
        let mut builder = Schema::builder();
        builder.add_text_field("title", TextOptions::text()).unwrap();
        let year = builder
            .add_i64_field("year", NumericOptions::default().with_indexed())
            .unwrap();
        let temp = builder
            .add_i64_field("temp", NumericOptions::default().with_indexed())
            .unwrap();
        let schema = builder.build();

        let docs = [(1999, -5), (2005, 0), (2010, 12), (2021, -40)]
            .into_iter()
            .map(|(y, t)| {
                let mut doc = Document::new();
                doc.add_i64("year", y);
                doc.add_i64("temp", t);
                doc
            })
            .collect::<Vec<_>>();
        (TestSegment::new(schema, &docs), year, temp)
    }

    fn run(segment: &TestSegment, query: RangeQuery) -> Vec<u32> {
        let ctx = segment.context();
        query.execute(&ctx).unwrap().iter().collect()
    }

    #[test]
    fn test_inclusive_and_exclusive() {
        let (segment, year, _) = segment();
        let inclusive = RangeQuery::new(
            year,
            Bound::Included(Term::from_field_i64(year, 2005)),
            Bound::Included(Term::from_field_i64(year, 2010)),
        );
        assert_eq!(run(&segment, inclusive), vec![1, 2]);

        let exclusive = RangeQuery::new(
            year,
            Bound::Excluded(Term::from_field_i64(year, 2005)),
            Bound::Excluded(Term::from_field_i64(year, 2021)),
        );
        assert_eq!(run(&segment, exclusive), vec![2]);
    }

    #[test]
    fn test_unbounded_stays_in_field() {
        let (segment, year, temp) = segment();
        let upper_only = RangeQuery::new(
            year,
            Bound::Unbounded,
            Bound::Excluded(Term::from_field_i64(year, 2010)),
        );
        assert_eq!(run(&segment, upper_only), vec![0, 1]);

        let all = RangeQuery::new(temp, Bound::Unbounded, Bound::Unbounded);
        assert_eq!(run(&segment, all), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_negative_values() {
        let (segment, _, temp) = segment();
        let below_zero = RangeQuery::new(
            temp,
            Bound::Unbounded,
            Bound::Excluded(Term::from_field_i64(temp, 0)),
        );
        assert_eq!(run(&segment, below_zero), vec![0, 3]);

        let query = RangeQuery::new(
            temp,
            Bound::Included(Term::from_field_i64(temp, -5)),
            Bound::Unbounded,
        );
        assert_eq!(run(&segment, query), vec![0, 1, 2]);
    }
}
