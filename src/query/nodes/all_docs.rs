//! All documents query - matches every document in the segment

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::DocId;
use crate::Result;
use roaring::RoaringBitmap;

/// Query that matches all documents with a constant score
#[derive(Clone, Debug, Default)]
pub struct AllDocsQuery;

impl AllDocsQuery {
    pub fn new() -> Self {
        Self
    }
}

impl QueryNode for AllDocsQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        Ok(ctx.all_docs())
    }

    fn score(&self, _ctx: &QueryContext, _doc: DocId) -> Result<f32> {
        Ok(1.0)
    }

    fn cache_key(&self) -> String {
        "all".to_string()
    }

    fn query_type(&self) -> &'static str {
        "all_docs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::TestSegment;

    #[test]
    fn test_all_docs() {
        let segment = TestSegment::titles(&["a", "b", "c"]);
        let ctx = segment.context();
        let docs = AllDocsQuery::new().execute(&ctx).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(AllDocsQuery.score(&ctx, 1).unwrap(), 1.0);
    }
}
