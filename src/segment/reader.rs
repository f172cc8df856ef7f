//! Immutable segment reader
//!
//! Loads every component of a segment into memory once; a reader is shared
//! (`Arc`) by all segment sets that contain the segment.

use std::io;

use crc32fast::Hasher;

use super::doc_store::DocStoreReader;
use super::fast_field::FastFields;
use super::manifest::SegmentMeta;
use super::postings::PostingsReader;
use super::statistics::SegmentStatistics;
use super::term::Term;
use super::term_dict::TermDictionary;
use super::types::{files, DocId, Posting, PostingListMeta, SegmentId};
use crate::directory::Directory;
use crate::document::Document;
use crate::error::ShowdexError;
use crate::schema::Schema;
use crate::Result;

pub struct SegmentReader {
    id: SegmentId,
    num_docs: u32,
    schema: Schema,
    terms: TermDictionary,
    postings: PostingsReader,
    store: DocStoreReader,
    fast: FastFields,
    stats: SegmentStatistics,
}

fn corrupt(id: SegmentId, what: &str, err: impl std::fmt::Display) -> ShowdexError {
    ShowdexError::Corrupt(format!("{} of {}: {}", what, id, err))
}

impl SegmentReader {
    /// Open a segment named by the manifest, verifying its checksum
    pub fn open(directory: &dyn Directory, meta: &SegmentMeta, schema: Schema) -> Result<Self> {
        let id = meta.id;
        let read = |name: &str| -> Result<Vec<u8>> {
            directory.read(&id.file(name)).map_err(|e| match e {
                ShowdexError::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                    ShowdexError::Corrupt(format!("segment {} is missing {}", id, name))
                }
                other => other,
            })
        };

        let fst_data = read(files::TERMS_FST)?;
        let term_meta_data = read(files::TERMS_META)?;
        let postings_data = read(files::POSTINGS)?;
        let store_data = read(files::STORE)?;
        let fast_data = read(files::FAST)?;
        let stats_data = read(files::STATS)?;

        let mut hasher = Hasher::new();
        for data in [
            &fst_data,
            &term_meta_data,
            &postings_data,
            &store_data,
            &fast_data,
            &stats_data,
        ] {
            hasher.update(data);
        }
        if hasher.finalize() != meta.checksum {
            return Err(ShowdexError::Corrupt(format!(
                "checksum mismatch for segment {}",
                id
            )));
        }

        let term_meta: Vec<PostingListMeta> = bincode::deserialize(&term_meta_data)
            .map_err(|e| corrupt(id, "term metadata", e))?;
        let terms =
            TermDictionary::new(fst_data, term_meta).map_err(|e| corrupt(id, "terms", e))?;
        let store = DocStoreReader::open(store_data)?;
        let fast: FastFields =
            bincode::deserialize(&fast_data).map_err(|e| corrupt(id, "fast fields", e))?;
        let stats: SegmentStatistics =
            bincode::deserialize(&stats_data).map_err(|e| corrupt(id, "statistics", e))?;

        if store.num_docs() != meta.num_docs || stats.doc_count != meta.num_docs {
            return Err(ShowdexError::Corrupt(format!(
                "segment {} holds {} docs, manifest says {}",
                id,
                store.num_docs(),
                meta.num_docs
            )));
        }

        Ok(Self {
            id,
            num_docs: meta.num_docs,
            schema,
            terms,
            postings: PostingsReader::new(postings_data),
            store,
            fast,
            stats,
        })
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Number of docs ever written, deleted ones included
    pub fn max_doc(&self) -> u32 {
        self.num_docs
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    pub fn term_meta(&self, term: &Term) -> Option<&PostingListMeta> {
        self.terms.get(term)
    }

    pub fn doc_freq(&self, term: &Term) -> u32 {
        self.term_meta(term).map(|m| m.doc_frequency).unwrap_or(0)
    }

    /// Decode the posting list of a term found in the dictionary
    pub fn read_postings(&self, term: &Term, meta: &PostingListMeta) -> Result<Vec<Posting>> {
        let record = self
            .schema
            .field_entry(term.field())
            .field_type()
            .record_option();
        self.postings
            .read_postings(meta, record)
            .map_err(|e| corrupt(self.id, "postings", e))
    }

    /// Postings of a term; empty if the term does not occur
    pub fn postings(&self, term: &Term) -> Result<Vec<Posting>> {
        match self.term_meta(term) {
            Some(meta) => self.read_postings(term, meta),
            None => Ok(Vec::new()),
        }
    }

    /// Stored fields of a document
    pub fn doc(&self, doc: DocId) -> Result<Document> {
        self.store.get(doc, &self.schema)
    }

    pub fn fast_fields(&self) -> &FastFields {
        &self.fast
    }

    pub fn stats(&self) -> &SegmentStatistics {
        &self.stats
    }
}
