//! Segment statistics for BM25 scoring
//!
//! Per indexed text field, a segment stores each document's field length
//! (token count) and the field's total token count.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::DocId;
use crate::config::Bm25Params;
use crate::schema::Field;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldLengths {
    /// Token count per doc id
    lengths: Vec<u32>,
    total: u64,
}

impl FieldLengths {
    pub fn get(&self, doc: DocId) -> u32 {
        self.lengths.get(doc as usize).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Statistics for a single segment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SegmentStatistics {
    pub doc_count: u32,
    fields: BTreeMap<u32, FieldLengths>,
}

impl SegmentStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the next document; returns its doc id
    pub fn add_document(&mut self) -> DocId {
        let doc = self.doc_count;
        self.doc_count += 1;
        for lengths in self.fields.values_mut() {
            lengths.lengths.push(0);
        }
        doc
    }

    /// Add tokens of `field` to the most recent document
    pub fn record_tokens(&mut self, field: Field, num_tokens: u32) {
        let doc_count = self.doc_count as usize;
        let lengths = self.fields.entry(field.field_id()).or_default();
        lengths.lengths.resize(doc_count, 0);
        if let Some(last) = lengths.lengths.last_mut() {
            *last += num_tokens;
            lengths.total += num_tokens as u64;
        }
    }

    pub fn field_length(&self, field: Field, doc: DocId) -> u32 {
        self.fields
            .get(&field.field_id())
            .map(|lengths| lengths.get(doc))
            .unwrap_or(0)
    }

    pub fn total_tokens(&self, field: Field) -> u64 {
        self.fields
            .get(&field.field_id())
            .map(FieldLengths::total)
            .unwrap_or(0)
    }
}

/// BM25 IDF: ln(1 + (N - n + 0.5) / (n + 0.5))
pub fn bm25_idf(total_docs: u64, doc_frequency: u64) -> f32 {
    let n = total_docs as f32;
    let df = doc_frequency as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// BM25 term weight for one document
pub fn bm25_term_score(idf: f32, tf: f32, field_len: f32, avg_field_len: f32, params: &Bm25Params) -> f32 {
    if tf == 0.0 {
        return 0.0;
    }
    let norm = if avg_field_len > 0.0 {
        1.0 - params.b + params.b * (field_len / avg_field_len)
    } else {
        1.0
    };
    idf * (tf * (params.k1 + 1.0)) / (tf + params.k1 * norm)
}
