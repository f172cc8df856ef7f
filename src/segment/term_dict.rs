//! Term dictionary using FST (Finite State Transducer)
//!
//! Maps term keys to an index into a parallel postings metadata array.
//! FST provides O(|key|) lookups and ordered range and prefix scans.

use std::io;
use std::ops::Bound;

use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use super::term::Term;
use super::types::PostingListMeta;

pub struct TermDictionary {
    fst: Map<Vec<u8>>,
    metadata: Vec<PostingListMeta>,
}

impl TermDictionary {
    pub fn new(fst_data: Vec<u8>, metadata: Vec<PostingListMeta>) -> io::Result<Self> {
        let fst = Map::new(fst_data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if fst.len() != metadata.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "term dictionary and metadata disagree on term count",
            ));
        }
        Ok(Self { fst, metadata })
    }

    pub fn get(&self, term: &Term) -> Option<&PostingListMeta> {
        self.fst
            .get(term.as_bytes())
            .and_then(|idx| self.metadata.get(idx as usize))
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Terms within byte bounds, in order
    pub fn range(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Vec<(Term, &PostingListMeta)> {
        let mut builder = self.fst.range();
        builder = match lower {
            Bound::Included(key) => builder.ge(key),
            Bound::Excluded(key) => builder.gt(key),
            Bound::Unbounded => builder,
        };
        builder = match upper {
            Bound::Included(key) => builder.le(key),
            Bound::Excluded(key) => builder.lt(key),
            Bound::Unbounded => builder,
        };

        let mut results = Vec::new();
        let mut stream = builder.into_stream();
        while let Some((key, idx)) = stream.next() {
            if let (Some(term), Some(meta)) = (Term::from_key(key), self.metadata.get(idx as usize))
            {
                results.push((term, meta));
            }
        }
        results
    }

    /// Terms starting with `prefix`, in order
    pub fn prefix(&self, prefix: &[u8]) -> Vec<(Term, &PostingListMeta)> {
        let mut results = Vec::new();
        let mut stream = self.fst.range().ge(prefix).into_stream();
        while let Some((key, idx)) = stream.next() {
            if !key.starts_with(prefix) {
                break;
            }
            if let (Some(term), Some(meta)) = (Term::from_key(key), self.metadata.get(idx as usize))
            {
                results.push((term, meta));
            }
        }
        results
    }

    pub fn fst_bytes(&self) -> &[u8] {
        self.fst.as_fst().as_bytes()
    }

    pub fn metadata(&self) -> &[PostingListMeta] {
        &self.metadata
    }
}

/// Builder for term dictionaries
#[derive(Default)]
pub struct TermDictionaryBuilder {
    terms: Vec<(Term, PostingListMeta)>,
}

impl TermDictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, term: Term, meta: PostingListMeta) {
        self.terms.push((term, meta));
    }

    /// Serialize into FST bytes and the parallel metadata array
    pub fn into_parts(mut self) -> io::Result<(Vec<u8>, Vec<PostingListMeta>)> {
        // FST requires sorted input
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fst_builder = MapBuilder::memory();
        let mut metadata = Vec::with_capacity(self.terms.len());

        for (idx, (term, meta)) in self.terms.into_iter().enumerate() {
            fst_builder
                .insert(term.as_bytes(), idx as u64)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            metadata.push(meta);
        }

        let fst_data = fst_builder.into_inner().map_err(io::Error::other)?;
        Ok((fst_data, metadata))
    }

    pub fn build(self) -> io::Result<TermDictionary> {
        let (fst_data, metadata) = self.into_parts()?;
        TermDictionary::new(fst_data, metadata)
    }
}
