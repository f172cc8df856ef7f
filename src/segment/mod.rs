//! Segment-based inverted index
//!
//! Segments are immutable once written. Deletes are recorded as separate
//! tombstone bitsets and the manifest names the durable segment set.
//!
//! # Architecture
//!
//! - `SegmentBuffer`: in-memory segment under construction
//! - `SegmentWriter`: serializes a buffer into segment files
//! - `SegmentReader`: immutable, shared view of one segment
//! - `IndexMeta`: the manifest (`meta.json`)

mod buffer;
mod deletes;
mod doc_store;
mod fast_field;
mod manifest;
mod postings;
mod reader;
mod statistics;
mod term;
mod term_dict;
mod types;
mod writer;

pub use buffer::{flatten_json, SegmentBuffer};
pub use deletes::{read_deletes, write_deletes};
pub use doc_store::{DocStoreReader, DocStoreWriter};
pub use fast_field::{numeric_fast_value, BytesColumn, FastFields, NumericColumn};
pub use manifest::{IndexMeta, SegmentMeta, FORMAT_VERSION, META_FILE, SCHEMA_FILE};
pub use postings::{PostingsReader, PostingsWriter};
pub use reader::SegmentReader;
pub use statistics::{bm25_idf, bm25_term_score, SegmentStatistics};
pub use term::{date_to_u64, i64_to_u64, u64_to_i64, Term, JSON_PATH_SEP};
pub use term_dict::{TermDictionary, TermDictionaryBuilder};
pub use types::{files, DocId, Posting, PostingListMeta, SegmentId};
pub use writer::{SegmentFiles, SegmentWriter};
