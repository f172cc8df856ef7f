//! Query execution context
//!
//! A `QueryContext` gives query nodes access to one segment plus the
//! searcher-wide statistics BM25 needs, and caches posting lists and
//! sub-query results for the duration of one search.

use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::sync::Arc;

use super::ast::QueryNode;
use crate::config::Bm25Params;
use crate::schema::Field;
use crate::segment::{bm25_idf, bm25_term_score, DocId, Posting, SegmentReader, Term};
use crate::Result;

/// Filter cache for reusing sub-query results
pub type FilterCache = RwLock<HashMap<String, RoaringBitmap>>;

/// Term statistics aggregated over every segment of a searcher
///
/// Scores are computed from these rather than per-segment numbers so that
/// the same document scores the same regardless of how the index is split.
#[derive(Clone, Debug, Default)]
pub struct GlobalStats {
    total_docs: u64,
    doc_freqs: HashMap<Term, u64>,
    avg_field_len: HashMap<Field, f32>,
}

impl GlobalStats {
    pub fn compute(segments: &[Arc<SegmentReader>], terms: &[Term]) -> Self {
        let total_docs: u64 = segments.iter().map(|s| s.max_doc() as u64).sum();

        let mut doc_freqs = HashMap::with_capacity(terms.len());
        let mut avg_field_len = HashMap::new();
        for term in terms {
            let df = segments.iter().map(|s| s.doc_freq(term) as u64).sum();
            doc_freqs.insert(term.clone(), df);

            let field = term.field();
            avg_field_len.entry(field).or_insert_with(|| {
                let tokens: u64 = segments.iter().map(|s| s.stats().total_tokens(field)).sum();
                if total_docs == 0 {
                    0.0
                } else {
                    tokens as f32 / total_docs as f32
                }
            });
        }

        Self {
            total_docs,
            doc_freqs,
            avg_field_len,
        }
    }

    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub fn doc_freq(&self, term: &Term) -> u64 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    pub fn avg_field_len(&self, field: Field) -> f32 {
        self.avg_field_len.get(&field).copied().unwrap_or(0.0)
    }

    pub fn idf(&self, term: &Term) -> f32 {
        bm25_idf(self.total_docs, self.doc_freq(term))
    }
}

/// Per-segment query execution context
pub struct QueryContext<'a> {
    segment: &'a SegmentReader,
    stats: &'a GlobalStats,
    bm25: Bm25Params,
    filter_cache: FilterCache,
    postings_cache: RwLock<HashMap<Term, Arc<Vec<Posting>>>>,
}

impl<'a> QueryContext<'a> {
    pub fn new(segment: &'a SegmentReader, stats: &'a GlobalStats, bm25: Bm25Params) -> Self {
        Self {
            segment,
            stats,
            bm25,
            filter_cache: RwLock::new(HashMap::new()),
            postings_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn segment(&self) -> &SegmentReader {
        self.segment
    }

    pub fn stats(&self) -> &GlobalStats {
        self.stats
    }

    /// Number of doc ids in the segment
    pub fn max_doc(&self) -> u32 {
        self.segment.max_doc()
    }

    /// Every doc id of the segment
    pub fn all_docs(&self) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..self.max_doc());
        bitmap
    }

    /// Decoded posting list of a term, sorted by doc id
    pub fn postings(&self, term: &Term) -> Result<Arc<Vec<Posting>>> {
        if let Some(cached) = self.postings_cache.read().get(term) {
            return Ok(cached.clone());
        }
        let postings = Arc::new(self.segment.postings(term)?);
        self.postings_cache
            .write()
            .insert(term.clone(), postings.clone());
        Ok(postings)
    }

    pub fn postings_bitmap(&self, term: &Term) -> Result<RoaringBitmap> {
        let postings = self.postings(term)?;
        Ok(postings.iter().map(|p| p.doc).collect())
    }

    /// Posting of a term in one document, if it occurs there
    pub fn posting(&self, term: &Term, doc: DocId) -> Result<Option<Posting>> {
        let postings = self.postings(term)?;
        Ok(postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|idx| postings[idx].clone()))
    }

    /// Get or compute a cached filter result
    pub fn get_or_cache_filter<F>(&self, cache_key: &str, compute: F) -> Result<RoaringBitmap>
    where
        F: FnOnce() -> Result<RoaringBitmap>,
    {
        if let Some(cached) = self.filter_cache.read().get(cache_key) {
            return Ok(cached.clone());
        }

        let result = compute()?;
        self.filter_cache
            .write()
            .insert(cache_key.to_string(), result.clone());
        Ok(result)
    }

    /// Docs matched by a node, computed once per context
    pub fn matches(&self, node: &dyn QueryNode) -> Result<RoaringBitmap> {
        self.get_or_cache_filter(&node.cache_key(), || node.execute(self))
    }

    /// BM25 weight of a term in one document; 0 if the term is absent
    pub fn bm25_score(&self, term: &Term, doc: DocId) -> Result<f32> {
        let Some(posting) = self.posting(term, doc)? else {
            return Ok(0.0);
        };
        let field = term.field();
        let field_len = self.segment.stats().field_length(field, doc) as f32;
        Ok(bm25_term_score(
            self.stats.idf(term),
            posting.term_frequency as f32,
            field_len,
            self.stats.avg_field_len(field),
            &self.bm25,
        ))
    }
}
