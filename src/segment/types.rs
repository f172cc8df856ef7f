//! Core types for the segment layer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Dense document number within a segment (0..max_doc)
pub type DocId = u32;

/// Segment identifier (monotonically increasing per index)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// Directory holding this segment's files
    pub fn dir_name(&self) -> String {
        format!("seg_{}", self.0)
    }

    pub fn file(&self, name: &str) -> PathBuf {
        PathBuf::from(self.dir_name()).join(name)
    }

    /// Tombstone file for a delete generation
    pub fn deletes_file(&self, del_gen: u64) -> PathBuf {
        self.file(&format!("deletes.{}.bin", del_gen))
    }

    /// Parse a `seg_<id>` directory name
    pub fn parse_dir_name(name: &str) -> Option<SegmentId> {
        name.strip_prefix("seg_")?.parse().ok().map(SegmentId)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg_{}", self.0)
    }
}

/// A single posting entry within a posting list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: DocId,
    /// Term frequency in this document (1 when frequencies are not recorded)
    pub term_frequency: u32,
    /// Token positions, empty when positions are not recorded
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc: DocId, term_frequency: u32) -> Self {
        Self {
            doc,
            term_frequency,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(doc: DocId, positions: Vec<u32>) -> Self {
        Self {
            doc,
            term_frequency: positions.len() as u32,
            positions,
        }
    }
}

/// Posting list metadata stored alongside the term dictionary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostingListMeta {
    /// Offset in the postings file
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
    /// Document frequency (number of documents containing this term)
    pub doc_frequency: u32,
    /// Total term frequency across all documents
    pub total_term_frequency: u64,
}

/// Names of the files making up a segment
pub mod files {
    pub const TERMS_FST: &str = "terms.fst";
    pub const TERMS_META: &str = "terms.meta";
    pub const POSTINGS: &str = "postings.bin";
    pub const STORE: &str = "store.bin";
    pub const FAST: &str = "fast.bin";
    pub const STATS: &str = "stats.bin";
}
