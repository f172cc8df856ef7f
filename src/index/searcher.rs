//! Searcher - an immutable snapshot of the segment set
//!
//! A searcher is bound to the segment set that was visible when it was
//! created; later commits and reloads never change what it sees.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use roaring::RoaringBitmap;
use tracing::debug;

use super::collector::{DocAddress, OrderKey, SortKey, TopCollector};
use crate::config::Bm25Params;
use crate::document::facet::FACET_SEP_BYTE;
use crate::document::value::micros_to_date;
use crate::document::{Document, Facet, Value};
use crate::error::ShowdexError;
use crate::query::{GlobalStats, Query, QueryContext};
use crate::schema::{Field, FieldType, Schema};
use crate::segment::{u64_to_i64, SegmentMeta, SegmentReader, Term};
use crate::Result;

/// One segment of a published set, with its tombstones
pub(crate) struct SegmentEntry {
    pub meta: SegmentMeta,
    pub reader: Arc<SegmentReader>,
    pub deletes: Arc<RoaringBitmap>,
}

impl SegmentEntry {
    fn live_docs(&self) -> u32 {
        self.reader.max_doc() - self.deletes.len() as u32
    }
}

/// Segments named by one durable manifest generation
pub(crate) struct SegmentSet {
    pub generation: u64,
    pub opstamp: u64,
    pub entries: Vec<SegmentEntry>,
    readers: Vec<Arc<SegmentReader>>,
}

impl SegmentSet {
    pub fn new(generation: u64, opstamp: u64, entries: Vec<SegmentEntry>) -> Self {
        let readers = entries.iter().map(|e| e.reader.clone()).collect();
        Self {
            generation,
            opstamp,
            entries,
            readers,
        }
    }

    pub fn readers(&self) -> &[Arc<SegmentReader>] {
        &self.readers
    }
}

/// Hits of one search, best first
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResult {
    pub hits: Vec<(OrderKey, DocAddress)>,
    /// Total live matches, when requested
    pub count: Option<u64>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn addresses(&self) -> Vec<DocAddress> {
        self.hits.iter().map(|(_, address)| *address).collect()
    }
}

/// Search parameters with defaults: 10 hits, counted, no offset, by score
#[derive(Clone, Debug)]
pub struct SearchRequest {
    query: Query,
    limit: usize,
    count: bool,
    order_by: Option<String>,
    offset: usize,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            limit: 10,
            count: true,
            order_by: None,
            offset: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    /// Rank by this fast field, descending, instead of by score
    pub fn with_order_by(mut self, field_name: impl Into<String>) -> Self {
        self.order_by = Some(field_name.into());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Read-only view over one segment set
#[derive(Clone)]
pub struct Searcher {
    inner: Arc<SearcherInner>,
}

struct SearcherInner {
    schema: Schema,
    segments: Arc<SegmentSet>,
    bm25: Bm25Params,
    /// Live docs per segment, computed once per snapshot
    live_docs: Vec<u32>,
}

impl fmt::Debug for Searcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("generation", &self.generation())
            .field("opstamp", &self.opstamp())
            .field("segments", &self.inner.live_docs)
            .finish()
    }
}

impl Searcher {
    pub(crate) fn new(schema: Schema, segments: Arc<SegmentSet>, bm25: Bm25Params) -> Self {
        let live_docs = segments.entries.iter().map(SegmentEntry::live_docs).collect();
        Self {
            inner: Arc::new(SearcherInner {
                schema,
                segments,
                bm25,
                live_docs,
            }),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Rank the matches of `query`, skip `offset` and keep `limit`
    ///
    /// Hits are ranked by BM25 score, or by `order_by_field` (a fast numeric
    /// or date field) descending with docs lacking a value last. Equal keys
    /// rank by address. `count` asks for the total number of live matches.
    pub fn search(
        &self,
        query: &Query,
        limit: usize,
        count: bool,
        order_by_field: Option<&str>,
        offset: usize,
    ) -> Result<SearchResult> {
        let order_by = order_by_field
            .map(|name| self.sort_field(name))
            .transpose()?;

        let stats = GlobalStats::compute(self.inner.segments.readers(), &query.terms());
        let mut collector = TopCollector::new(offset.saturating_add(limit));
        let mut total = 0u64;

        for (ord, entry) in self.inner.segments.entries.iter().enumerate() {
            let ctx = QueryContext::new(&entry.reader, &stats, self.inner.bm25);
            let mut matches = query.node().execute(&ctx)?;
            matches -= entry.deletes.as_ref();
            total += matches.len();
            if !collector.is_active() {
                continue;
            }

            let column = order_by.and_then(|field| entry.reader.fast_fields().numeric(field));
            for doc in matches.iter() {
                let key = match order_by {
                    Some(_) => SortKey::Fast(column.and_then(|c| c.first(doc))),
                    None => SortKey::Score(query.node().score(&ctx, doc)?),
                };
                collector.collect(key, DocAddress::new(ord as u32, doc));
            }
        }

        let hits = collector
            .into_sorted()
            .into_iter()
            .skip(offset)
            .map(|hit| (self.order_key(hit.key, order_by), hit.address))
            .collect::<Vec<_>>();

        debug!(
            query_type = query.query_type(),
            matches = total,
            hits = hits.len(),
            "Search executed"
        );

        Ok(SearchResult {
            hits,
            count: count.then_some(total),
        })
    }

    /// Run a [`SearchRequest`]
    pub fn execute(&self, request: &SearchRequest) -> Result<SearchResult> {
        self.search(
            &request.query,
            request.limit,
            request.count,
            request.order_by.as_deref(),
            request.offset,
        )
    }

    fn sort_field(&self, name: &str) -> Result<Field> {
        let (field, entry) = self.inner.schema.get_field_entry(name).ok_or_else(|| {
            ShowdexError::InvalidArgument(format!("unknown order-by field '{}'", name))
        })?;
        if !entry.field_type().supports_sorting() {
            return Err(ShowdexError::InvalidArgument(format!(
                "field '{}' must be a fast i64, u64 or date field to order by",
                name
            )));
        }
        Ok(field)
    }

    fn order_key(&self, key: SortKey, order_by: Option<Field>) -> OrderKey {
        match (key, order_by) {
            (SortKey::Score(score), _) => OrderKey::Score(score),
            (SortKey::Fast(value), Some(field)) => {
                let field_type = self.inner.schema.field_entry(field).field_type();
                OrderKey::Value(value.and_then(|v| match field_type {
                    FieldType::I64(_) => Some(Value::I64(u64_to_i64(v))),
                    FieldType::U64(_) => Some(Value::U64(v)),
                    FieldType::Date(_) => micros_to_date(u64_to_i64(v)).map(Value::Date),
                    _ => None,
                }))
            }
            (SortKey::Fast(_), None) => OrderKey::Value(None),
        }
    }

    /// Live documents across all segments
    pub fn num_docs(&self) -> u64 {
        self.inner.live_docs.iter().map(|n| *n as u64).sum()
    }

    pub fn num_segments(&self) -> usize {
        self.inner.segments.entries.len()
    }

    /// Live documents per segment, in segment order
    pub fn segment_doc_counts(&self) -> Vec<u32> {
        self.inner.live_docs.clone()
    }

    /// Opstamp of the commit this searcher sees
    pub fn opstamp(&self) -> u64 {
        self.inner.segments.opstamp
    }

    pub fn generation(&self) -> u64 {
        self.inner.segments.generation
    }

    /// Stored fields of the document at `address`
    pub fn doc(&self, address: DocAddress) -> Result<Document> {
        let invalid = || ShowdexError::InvalidAddress {
            segment_ord: address.segment_ord,
            doc_id: address.doc_id,
        };
        let entry = self
            .inner
            .segments
            .entries
            .get(address.segment_ord as usize)
            .ok_or_else(invalid)?;
        if address.doc_id >= entry.reader.max_doc() {
            return Err(invalid());
        }
        entry.reader.doc(address.doc_id)
    }

    /// Number of live documents containing `term`
    pub fn doc_freq(&self, term: &Term) -> Result<u64> {
        let mut total = 0;
        for entry in &self.inner.segments.entries {
            let Some(meta) = entry.reader.term_meta(term) else {
                continue;
            };
            if entry.deletes.is_empty() {
                total += meta.doc_frequency as u64;
                continue;
            }
            for posting in entry.reader.read_postings(term, meta)? {
                if !entry.deletes.contains(posting.doc) {
                    total += 1;
                }
            }
        }
        Ok(total)
    }

    /// Matching live docs per direct child of `prefix`
    ///
    /// Each child facet of `prefix` is counted once per matching document
    /// whose `field_name` values lie in that child's subtree. The field must
    /// be a fast facet field. Children come back in path order.
    pub fn facet_counts(
        &self,
        query: &Query,
        field_name: &str,
        prefix: &Facet,
    ) -> Result<Vec<(Facet, u64)>> {
        let (field, entry) = self.inner.schema.get_field_entry(field_name).ok_or_else(|| {
            ShowdexError::InvalidArgument(format!("unknown facet field '{}'", field_name))
        })?;
        if !matches!(entry.field_type(), FieldType::Facet(_)) || !entry.is_fast() {
            return Err(ShowdexError::InvalidArgument(format!(
                "field '{}' must be a fast facet field",
                field_name
            )));
        }

        let stats = GlobalStats::default();
        let mut counts: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for segment in &self.inner.segments.entries {
            let Some(column) = segment.reader.fast_fields().bytes(field) else {
                continue;
            };
            // Child of `prefix` for each dictionary ordinal, computed once
            let children: Vec<Option<Vec<u8>>> = column
                .dictionary()
                .iter()
                .map(|encoded| facet_child(prefix, encoded))
                .collect();

            let ctx = QueryContext::new(&segment.reader, &stats, self.inner.bm25);
            let mut matches = query.node().execute(&ctx)?;
            matches -= segment.deletes.as_ref();

            let mut seen: HashSet<&[u8]> = HashSet::new();
            for doc in matches.iter() {
                seen.clear();
                for ord in column.ordinals(doc) {
                    if let Some(Some(child)) = children.get(*ord as usize) {
                        if seen.insert(child.as_slice()) {
                            *counts.entry(child.clone()).or_insert(0) += 1;
                        }
                    }
                }
            }
        }

        counts
            .into_iter()
            .map(|(encoded, count)| Ok((Facet::from_encoded(&encoded)?, count)))
            .collect()
    }
}

/// Encoded child of `prefix` on the path to `encoded`, if below `prefix`
fn facet_child(prefix: &Facet, encoded: &[u8]) -> Option<Vec<u8>> {
    let rest = if prefix.is_root() {
        encoded
    } else {
        let mut start = prefix.encoded();
        start.push(FACET_SEP_BYTE);
        encoded.strip_prefix(start.as_slice())?
    };
    if rest.is_empty() {
        return None;
    }
    let segment_len = rest
        .iter()
        .position(|b| *b == FACET_SEP_BYTE)
        .unwrap_or(rest.len());
    let consumed = encoded.len() - rest.len() + segment_len;
    Some(encoded[..consumed].to_vec())
}
