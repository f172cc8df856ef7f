//! Facet query - matches a facet and its whole subtree

use crate::document::{facet::FACET_SEP_BYTE, Facet};
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::schema::Field;
use crate::segment::{DocId, Term};
use crate::Result;
use roaring::RoaringBitmap;

/// Query that matches documents holding `facet` or any descendant of it
///
/// Children of `/a/b` are indexed as `a 0x00 b 0x00 ...`, so the subtree is
/// the exact term plus every term prefixed by the encoded facet and the
/// separator. The root facet matches every faceted document.
#[derive(Clone, Debug)]
pub struct FacetQuery {
    pub field: Field,
    pub facet: Facet,
}

impl FacetQuery {
    pub fn new(field: Field, facet: Facet) -> Self {
        Self { field, facet }
    }

    fn subtree_prefix(&self) -> Term {
        if self.facet.is_root() {
            Term::field_start(self.field)
        } else {
            let mut encoded = self.facet.encoded();
            encoded.push(FACET_SEP_BYTE);
            Term::from_field_bytes(self.field, &encoded)
        }
    }
}

impl QueryNode for FacetQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let mut result = ctx.postings_bitmap(&Term::from_field_facet(self.field, &self.facet))?;
        let segment = ctx.segment();
        for (term, meta) in segment.terms().prefix(self.subtree_prefix().as_bytes()) {
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
        format!("facet:{}:{}", self.field.field_id(), self.facet)
    }

    fn query_type(&self) -> &'static str {
        "facet"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::query::nodes::test_util::TestSegment;
    use crate::schema::{FacetOptions, Schema};

    fn segment() -> (TestSegment, Field) {
        let mut builder = Schema::builder();
        let category = builder
            .add_facet_field("category", FacetOptions::default())
            .unwrap();
        let schema = builder.build();
        let docs = ["/a/b", "/a/bc", "/a/b/c", "/a", "/x"]
            .into_iter()
            .map(|path| {
                let mut doc = Document::new();
                doc.add_facet("category", Facet::from_string(path).unwrap());
                doc
            })
            .collect::<Vec<_>>();
        (TestSegment::new(schema, &docs), category)
    }

    fn run(segment: &TestSegment, field: Field, path: &str) -> Vec<u32> {
        let ctx = segment.context();
        FacetQuery::new(field, Facet::from_string(path).unwrap())
            .execute(&ctx)
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn test_subtree() {
        let (segment, category) = segment();
        assert_eq!(run(&segment, category, "/a/b"), vec![0, 2]);
        assert_eq!(run(&segment, category, "/a"), vec![0, 1, 2, 3]);
        assert_eq!(run(&segment, category, "/a/b/c"), vec![2]);
        assert!(run(&segment, category, "/y").is_empty());
    }

    #[test]
    fn test_root_matches_everything() {
        let (segment, category) = segment();
        assert_eq!(run(&segment, category, "/"), vec![0, 1, 2, 3, 4]);
    }
}
