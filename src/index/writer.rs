//! Single-writer transactional front end
//!
//! Added documents are analysed into an in-memory [`SegmentBuffer`]. Once
//! the buffer outgrows the heap budget it is handed to the writer's worker
//! pool and serialized into an uncommitted segment in the background.
//! Nothing the writer produces is visible until [`IndexWriter::commit`]
//! replaces the manifest.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use super::Index;
use crate::config::{Bm25Params, ReloadPolicy, WriterConfig};
use crate::document::{Document, Value};
use crate::directory::{Directory, WRITER_LOCK_FILE};
use crate::error::ShowdexError;
use crate::query::{GlobalStats, Query, QueryContext, QueryNode};
use crate::segment::{
    files, write_deletes, IndexMeta, SegmentBuffer, SegmentId, SegmentMeta, SegmentWriter,
    META_FILE, SCHEMA_FILE,
};
use crate::Result;

/// Lifecycle of the open transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing staged since the last commit or rollback
    Idle,
    /// Operations staged in memory
    Buffering,
    /// At least one buffer is being serialized in the background
    Flushing,
    /// A commit is writing segments and the manifest
    Committing,
}

type FlushResult = (SegmentId, Result<SegmentMeta>);

/// The single writer of an [`Index`]
///
/// Dropping the writer discards uncommitted work and releases the lock.
pub struct IndexWriter {
    index: Index,
    config: WriterConfig,
    state: WriterState,
    buffer: SegmentBuffer,
    pool: rayon::ThreadPool,
    flush_tx: Sender<FlushResult>,
    flush_rx: Receiver<FlushResult>,
    /// Flushes whose result has not been received yet
    outstanding: usize,
    /// Flushes still running on the pool
    running: Arc<AtomicUsize>,
    /// Flushed segments of the open transaction
    pending: Vec<SegmentMeta>,
    flush_error: Option<ShowdexError>,
    deletes: Vec<Query>,
    /// Last durable manifest
    committed: IndexMeta,
    next_segment_id: u64,
    commit_opstamp: u64,
}

impl IndexWriter {
    /// Called by [`Index`] with the writer lock held
    pub(crate) fn open(index: Index, config: WriterConfig) -> Result<IndexWriter> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("showdex-writer-{}", i))
            .build()
            .map_err(|e| ShowdexError::Internal(format!("failed to start writer pool: {}", e)))?;

        let committed = IndexMeta::load(index.directory().as_ref())?
            .ok_or_else(|| ShowdexError::Corrupt(format!("{} is missing", META_FILE)))?;
        index.observe_opstamp(committed.opstamp);

        // Leftovers of a commit that never reached its manifest
        let removed = remove_unreferenced(index.directory().as_ref(), &committed)?;

        let (flush_tx, flush_rx) = channel::unbounded();
        let writer = IndexWriter {
            buffer: SegmentBuffer::new(index.schema().clone()),
            next_segment_id: committed.next_segment_id,
            commit_opstamp: committed.opstamp,
            committed,
            index,
            config,
            state: WriterState::Idle,
            pool,
            flush_tx,
            flush_rx,
            outstanding: 0,
            running: Arc::new(AtomicUsize::new(0)),
            pending: Vec::new(),
            flush_error: None,
            deletes: Vec::new(),
        };

        info!(
            threads = writer.config.num_threads,
            heap_size = writer.config.heap_size,
            generation = writer.committed.generation,
            removed,
            "Writer opened"
        );
        Ok(writer)
    }

    /// Validate and buffer a document; returns its opstamp
    pub fn add_document(&mut self, doc: Document) -> Result<u64> {
        self.index.schema().validate_document(&doc)?;
        self.buffer.add_document(&doc)?;
        let opstamp = self.index.next_opstamp();
        self.touch();

        self.collect_finished_flushes();
        if self.buffer.heap_usage() >= self.config.heap_size {
            self.dispatch_flush();
        }
        Ok(opstamp)
    }

    /// Parse a JSON object and buffer it
    pub fn add_json(&mut self, json_text: &str) -> Result<u64> {
        let json: serde_json::Value = serde_json::from_str(json_text)?;
        let doc = Document::from_dict_with(
            &json,
            self.index.schema(),
            self.config.ignore_unknown_fields,
        )?;
        self.add_document(doc)
    }

    /// Stage deletion of every committed document whose `field_name`
    /// holds exactly `value`
    pub fn delete_documents(&mut self, field_name: &str, value: &Value) -> Result<u64> {
        let schema = self.index.schema();
        let (field, entry) = schema
            .get_field_entry(field_name)
            .ok_or_else(|| ShowdexError::Schema(format!("unknown field '{}'", field_name)))?;
        if !entry.is_indexed() {
            return Err(ShowdexError::Schema(format!(
                "field '{}' is not indexed",
                field_name
            )));
        }
        let query = Query::exact(schema, field, value)?;
        self.delete_query(query)
    }

    /// Stage deletion of every committed document matching `query`
    pub fn delete_query(&mut self, query: Query) -> Result<u64> {
        self.deletes.push(query);
        let opstamp = self.index.next_opstamp();
        self.touch();
        Ok(opstamp)
    }

    /// Make the open transaction durable; returns the commit opstamp
    ///
    /// On failure the previous durable state is left untouched and the
    /// transaction is discarded.
    pub fn commit(&mut self) -> Result<u64> {
        self.state = WriterState::Committing;
        let result = self.try_commit();
        self.state = WriterState::Idle;

        match result {
            Ok(opstamp) => {
                self.commit_opstamp = opstamp;
                info!(
                    opstamp,
                    generation = self.committed.generation,
                    segments = self.committed.segments.len(),
                    docs = self.committed.live_docs(),
                    "Committed"
                );
                if let Err(e) = self.collect_garbage() {
                    warn!(error = %e, "Garbage collection after commit failed");
                }
                if self.index.reload_policy() == ReloadPolicy::OnCommit {
                    if let Err(e) = self.index.reload() {
                        warn!(error = %e, "Reload after commit failed");
                    }
                }
                Ok(opstamp)
            }
            Err(e) => {
                warn!(error = %e, "Commit failed, transaction discarded");
                self.discard();
                if let Err(gc_err) = self.collect_garbage() {
                    warn!(error = %gc_err, "Garbage collection after failed commit failed");
                }
                Err(e)
            }
        }
    }

    fn try_commit(&mut self) -> Result<u64> {
        self.wait_for_flushes();
        if let Some(e) = self.flush_error.take() {
            return Err(e);
        }

        let directory = self.index.directory().clone();
        if !self.buffer.is_empty() {
            let buffer = self.take_buffer();
            let segment_id = self.allocate_segment_id();
            let segment = self
                .pool
                .install(|| SegmentWriter::new(segment_id).write(buffer, directory.as_ref()))?;
            self.pending.push(segment);
        }

        let mut meta = self.committed.clone();
        let generation = meta.generation + 1;

        if !self.deletes.is_empty() {
            let stats = GlobalStats::default();
            let bm25 = Bm25Params::default();
            for segment in meta.segments.iter_mut() {
                let reader = self.index.segment_reader(segment)?;
                let mut deleted = self.index.segment_deletes(segment)?;
                let before = deleted.len();
                let ctx = QueryContext::new(&reader, &stats, bm25);
                for query in &self.deletes {
                    deleted |= query.node().execute(&ctx)?;
                }
                if deleted.len() != before {
                    write_deletes(directory.as_ref(), segment.id, generation, &deleted)?;
                    segment.del_gen = Some(generation);
                    segment.num_deleted = deleted.len() as u32;
                    debug!(
                        segment = %segment.id,
                        deleted = deleted.len() - before,
                        "Applied deletes"
                    );
                }
            }
        }

        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|segment| segment.id);
        meta.segments.extend(pending);
        meta.generation = generation;
        meta.next_segment_id = self.next_segment_id;
        meta.opstamp = self.index.next_opstamp();

        // Commit point
        meta.save(directory.as_ref())?;

        let opstamp = meta.opstamp;
        self.committed = meta;
        self.deletes.clear();
        Ok(opstamp)
    }

    /// Discard everything staged since the last commit
    pub fn rollback(&mut self) -> Result<u64> {
        self.wait_for_flushes();
        let discarded_docs = self.buffer.num_docs() as u64
            + self.pending.iter().map(|s| s.num_docs as u64).sum::<u64>();
        let discarded_deletes = self.deletes.len();
        self.discard();
        self.state = WriterState::Idle;
        let removed = self.collect_garbage()?;

        let opstamp = self.index.next_opstamp();
        info!(
            opstamp,
            discarded_docs, discarded_deletes, removed, "Rolled back"
        );
        Ok(opstamp)
    }

    /// Opstamp of the last successful commit
    pub fn commit_opstamp(&self) -> u64 {
        self.commit_opstamp
    }

    pub fn state(&self) -> WriterState {
        match self.state {
            WriterState::Flushing if self.running.load(Ordering::Acquire) == 0 => {
                WriterState::Buffering
            }
            state => state,
        }
    }

    /// Documents added since the last commit, flushed or not
    pub fn num_buffered_docs(&self) -> u64 {
        let flushed: u64 = self.pending.iter().map(|s| s.num_docs as u64).sum();
        flushed + self.buffer.num_docs() as u64
    }

    /// Bytes held by the in-memory buffer
    pub fn heap_usage(&self) -> usize {
        self.buffer.heap_usage()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    fn touch(&mut self) {
        if self.state == WriterState::Idle {
            self.state = WriterState::Buffering;
        }
    }

    fn take_buffer(&mut self) -> SegmentBuffer {
        std::mem::replace(
            &mut self.buffer,
            SegmentBuffer::new(self.index.schema().clone()),
        )
    }

    fn allocate_segment_id(&mut self) -> SegmentId {
        let id = SegmentId(self.next_segment_id);
        self.next_segment_id += 1;
        id
    }

    /// Serialize the current buffer on the pool
    fn dispatch_flush(&mut self) {
        let buffer = self.take_buffer();
        let segment_id = self.allocate_segment_id();
        let directory = self.index.directory().clone();
        let tx = self.flush_tx.clone();
        let running = self.running.clone();

        debug!(
            segment = %segment_id,
            docs = buffer.num_docs(),
            heap = buffer.heap_usage(),
            "Dispatching background flush"
        );
        running.fetch_add(1, Ordering::AcqRel);
        self.outstanding += 1;
        self.state = WriterState::Flushing;

        self.pool.spawn(move || {
            let result = SegmentWriter::new(segment_id).write(buffer, directory.as_ref());
            running.fetch_sub(1, Ordering::AcqRel);
            // The writer owns the receiver for as long as flushes are outstanding
            let _ = tx.send((segment_id, result));
        });
    }

    fn record_flush(&mut self, (segment_id, result): FlushResult) {
        self.outstanding -= 1;
        match result {
            Ok(segment) => self.pending.push(segment),
            Err(e) => {
                warn!(segment = %segment_id, error = %e, "Background flush failed");
                self.flush_error.get_or_insert(e);
            }
        }
    }

    fn collect_finished_flushes(&mut self) {
        while self.outstanding > 0 {
            match self.flush_rx.try_recv() {
                Ok(flushed) => self.record_flush(flushed),
                Err(_) => break,
            }
        }
    }

    fn wait_for_flushes(&mut self) {
        while self.outstanding > 0 {
            match self.flush_rx.recv() {
                Ok(flushed) => self.record_flush(flushed),
                Err(_) => break,
            }
        }
        if self.state == WriterState::Flushing {
            self.state = WriterState::Buffering;
        }
    }

    fn discard(&mut self) {
        self.buffer = SegmentBuffer::new(self.index.schema().clone());
        self.pending.clear();
        self.deletes.clear();
        self.flush_error = None;
    }

    /// Only runs with no flush outstanding
    fn collect_garbage(&self) -> Result<usize> {
        remove_unreferenced(self.index.directory().as_ref(), &self.committed)
    }
}

/// Delete files the durable manifest does not reference
fn remove_unreferenced(directory: &dyn Directory, committed: &IndexMeta) -> Result<usize> {
    let mut live: HashSet<PathBuf> = HashSet::new();
    for segment in &committed.segments {
        for name in [
            files::TERMS_FST,
            files::TERMS_META,
            files::POSTINGS,
            files::STORE,
            files::FAST,
            files::STATS,
        ] {
            live.insert(segment.id.file(name));
        }
        if let Some(del_gen) = segment.del_gen {
            live.insert(segment.id.deletes_file(del_gen));
        }
    }

    let mut removed = 0;
    for path in directory.list_files()? {
        if live.contains(&path) || !is_collectable(&path) {
            continue;
        }
        directory.delete(&path)?;
        removed += 1;
    }
    if removed > 0 {
        debug!(removed, "Garbage collected unreferenced files");
    }
    Ok(removed)
}

/// Segment files and leftover temporaries; never the manifest, schema or lock
fn is_collectable(path: &Path) -> bool {
    let mut components = path.components();
    let Some(first) = components.next() else {
        return false;
    };
    let first = first.as_os_str();
    if components.next().is_some() {
        return first
            .to_str()
            .and_then(SegmentId::parse_dir_name)
            .is_some();
    }
    if [META_FILE, SCHEMA_FILE, WRITER_LOCK_FILE]
        .iter()
        .any(|name| first == OsStr::new(name))
    {
        return false;
    }
    path.extension() == Some(OsStr::new("tmp"))
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        self.wait_for_flushes();
        if !self.pending.is_empty() || !self.buffer.is_empty() {
            debug!(
                docs = self.num_buffered_docs(),
                "Discarding uncommitted documents"
            );
        }
        self.discard();
        if let Err(e) = self.collect_garbage() {
            warn!(error = %e, "Garbage collection on writer close failed");
        }
        self.index.release_writer_lock();
        debug!("Writer closed");
    }
}
