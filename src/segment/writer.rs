//! Segment writer: turns a filled buffer into immutable segment files
//!
//! Files written per segment: term dictionary FST, term metadata, postings,
//! doc store, fast fields and statistics. A crc32 over all of them is kept
//! in the manifest and checked when the segment is opened.

use std::path::PathBuf;

use crc32fast::Hasher;
use tracing::debug;

use super::buffer::SegmentBuffer;
use super::manifest::SegmentMeta;
use super::postings::PostingsWriter;
use super::term_dict::TermDictionaryBuilder;
use super::types::{files, SegmentId};
use crate::directory::Directory;
use crate::Result;

/// Serialized segment components, in checksum order
pub struct SegmentFiles {
    pub fst_data: Vec<u8>,
    pub term_meta_data: Vec<u8>,
    pub postings_data: Vec<u8>,
    pub store_data: Vec<u8>,
    pub fast_data: Vec<u8>,
    pub stats_data: Vec<u8>,
}

impl SegmentFiles {
    /// crc32 over every persisted component
    pub fn checksum(&self) -> u32 {
        let mut hasher = Hasher::new();
        for (_, data) in self.entries() {
            hasher.update(data);
        }
        hasher.finalize()
    }

    pub fn entries(&self) -> [(&'static str, &[u8]); 6] {
        [
            (files::TERMS_FST, self.fst_data.as_slice()),
            (files::TERMS_META, self.term_meta_data.as_slice()),
            (files::POSTINGS, self.postings_data.as_slice()),
            (files::STORE, self.store_data.as_slice()),
            (files::FAST, self.fast_data.as_slice()),
            (files::STATS, self.stats_data.as_slice()),
        ]
    }

    pub fn total_bytes(&self) -> usize {
        self.entries().iter().map(|(_, data)| data.len()).sum()
    }
}

/// Writer for creating new segments from a buffer
pub struct SegmentWriter {
    segment_id: SegmentId,
}

impl SegmentWriter {
    pub fn new(segment_id: SegmentId) -> Self {
        Self { segment_id }
    }

    /// Serialize a buffer into segment components
    pub fn serialize(&self, buffer: SegmentBuffer) -> Result<(SegmentFiles, u32)> {
        let schema = buffer.schema().clone();
        let num_docs = buffer.num_docs();
        let (postings, store, fast, stats) = buffer.into_parts();

        let mut terms: Vec<_> = postings.into_iter().collect();
        terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut postings_writer = PostingsWriter::new();
        let mut term_builder = TermDictionaryBuilder::with_capacity(terms.len());
        for (term, list) in terms {
            let record = schema.field_entry(term.field()).field_type().record_option();
            let meta = postings_writer.write_posting_list(&list, record);
            term_builder.add(term, meta);
        }
        let (fst_data, term_meta) = term_builder.into_parts()?;

        let files = SegmentFiles {
            fst_data,
            term_meta_data: bincode::serialize(&term_meta)?,
            postings_data: postings_writer.into_data(),
            store_data: store.into_data(),
            fast_data: bincode::serialize(&fast.finish())?,
            stats_data: bincode::serialize(&stats)?,
        };
        Ok((files, num_docs))
    }

    /// Serialize a buffer and persist it under `seg_<id>/`
    pub fn write(&self, buffer: SegmentBuffer, directory: &dyn Directory) -> Result<SegmentMeta> {
        let (files, num_docs) = self.serialize(buffer)?;
        for (name, data) in files.entries() {
            let path: PathBuf = self.segment_id.file(name);
            directory.atomic_write(&path, data)?;
        }

        debug!(
            segment = %self.segment_id,
            num_docs,
            bytes = files.total_bytes(),
            "Segment written"
        );

        Ok(SegmentMeta {
            id: self.segment_id,
            num_docs,
            num_deleted: 0,
            del_gen: None,
            checksum: files.checksum(),
        })
    }
}
