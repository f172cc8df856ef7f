//! Index - schema, storage and the published segment set
//!
//! An [`Index`] owns a [`Directory`] and the schema stored in it. It hands
//! out the single [`IndexWriter`] and pooled [`Searcher`]s. Committed
//! segments only become visible through [`Index::reload`], which the writer
//! calls after each commit under the `oncommit` reload policy.

mod collector;
mod searcher;
mod writer;

pub use collector::{DocAddress, OrderKey};
pub use searcher::{SearchRequest, SearchResult, Searcher};
pub use writer::{IndexWriter, WriterState};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use tracing::{debug, info};

use crate::config::{Bm25Params, LockWaitPolicy, ReaderConfig, ReloadPolicy, WriterConfig};
use crate::directory::{Directory, FsDirectory, RamDirectory};
use crate::error::ShowdexError;
use crate::query::{parse_query, Query};
use crate::schema::Schema;
use crate::segment::{read_deletes, IndexMeta, SegmentId, SegmentMeta, SegmentReader, META_FILE, SCHEMA_FILE};
use crate::Result;
use searcher::{SegmentEntry, SegmentSet};

/// Pause between attempts to take a held writer lock
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// A searchable, writable index
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

struct IndexInner {
    schema: Schema,
    directory: Arc<dyn Directory>,
    bm25: Bm25Params,
    reader_config: RwLock<ReaderConfig>,
    /// Segment set new searchers are built on
    visible: ArcSwap<SegmentSet>,
    searchers: ArcSwap<Vec<Searcher>>,
    next_searcher: AtomicUsize,
    /// Open segment readers, reused across reloads
    readers: Mutex<HashMap<SegmentId, Arc<SegmentReader>>>,
    reload_lock: Mutex<()>,
    writer_open: AtomicBool,
    /// Last opstamp handed out
    opstamp: AtomicU64,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("directory", &self.inner.directory)
            .field("generation", &self.inner.visible.load().generation)
            .field("opstamp", &self.visible_opstamp())
            .finish()
    }
}

impl Index {
    /// Create an index, in memory when `path` is `None`
    ///
    /// An existing index at `path` is an error unless `reuse` is set, in
    /// which case it is opened and its schema must equal `schema`.
    pub fn create(schema: Schema, path: Option<&Path>, reuse: bool) -> Result<Index> {
        let Some(path) = path else {
            let directory: Arc<dyn Directory> = Arc::new(RamDirectory::new());
            Self::initialize(directory.as_ref(), &schema)?;
            info!("Created in-memory index");
            return Self::open_in(directory, schema);
        };

        if Self::exists(path) {
            if !reuse {
                return Err(ShowdexError::IndexExists(path.to_path_buf()));
            }
            let index = Self::open(path)?;
            if index.schema() != &schema {
                return Err(ShowdexError::SchemaIncompatible(format!(
                    "index at {} was created with a different schema",
                    path.display()
                )));
            }
            return Ok(index);
        }

        if path.is_dir() && path.read_dir()?.next().is_some() {
            return Err(ShowdexError::Corrupt(format!(
                "{} is not empty and holds no index",
                path.display()
            )));
        }

        let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(path)?);
        Self::initialize(directory.as_ref(), &schema)?;
        info!(path = %path.display(), fields = schema.num_fields(), "Created index");
        Self::open_in(directory, schema)
    }

    /// Schema first; the manifest makes the directory an index
    fn initialize(directory: &dyn Directory, schema: &Schema) -> Result<()> {
        directory.atomic_write(Path::new(SCHEMA_FILE), schema.to_json()?.as_bytes())?;
        IndexMeta::default().save(directory)
    }

    /// Open the index stored at `path`
    pub fn open(path: &Path) -> Result<Index> {
        if !Self::exists(path) {
            return Err(ShowdexError::NotFound(path.to_path_buf()));
        }
        let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(path)?);

        let schema_bytes = directory
            .read(Path::new(SCHEMA_FILE))
            .map_err(|e| ShowdexError::Corrupt(format!("unreadable {}: {}", SCHEMA_FILE, e)))?;
        let schema_json = String::from_utf8(schema_bytes)
            .map_err(|e| ShowdexError::Corrupt(format!("unreadable {}: {}", SCHEMA_FILE, e)))?;
        let schema = Schema::from_json(&schema_json)
            .map_err(|e| ShowdexError::Corrupt(format!("unreadable {}: {}", SCHEMA_FILE, e)))?;

        let index = Self::open_in(directory, schema)?;
        info!(
            path = %path.display(),
            segments = index.inner.visible.load().entries.len(),
            opstamp = index.visible_opstamp(),
            "Opened index"
        );
        Ok(index)
    }

    fn open_in(directory: Arc<dyn Directory>, schema: Schema) -> Result<Index> {
        let meta = IndexMeta::load(directory.as_ref())?.ok_or_else(|| {
            ShowdexError::Corrupt(format!("{} disappeared while opening", META_FILE))
        })?;

        let index = Index {
            inner: Arc::new(IndexInner {
                schema,
                directory,
                bm25: Bm25Params::default(),
                reader_config: RwLock::new(ReaderConfig::default()),
                visible: ArcSwap::from_pointee(SegmentSet::new(0, 0, Vec::new())),
                searchers: ArcSwap::from_pointee(Vec::new()),
                next_searcher: AtomicUsize::new(0),
                readers: Mutex::new(HashMap::new()),
                reload_lock: Mutex::new(()),
                writer_open: AtomicBool::new(false),
                opstamp: AtomicU64::new(meta.opstamp),
            }),
        };
        let segments = index.load_segment_set(&meta).map_err(|e| match e {
            ShowdexError::Io(io_err) => {
                ShowdexError::Corrupt(format!("unreadable segment data: {}", io_err))
            }
            other => other,
        })?;
        index.publish(segments);
        Ok(index)
    }

    /// Whether `path` holds an index manifest
    pub fn exists(path: &Path) -> bool {
        path.join(META_FILE).is_file()
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Filesystem location, `None` for in-memory indexes
    pub fn directory_path(&self) -> Option<PathBuf> {
        self.inner.directory.root().map(Path::to_path_buf)
    }

    pub(crate) fn directory(&self) -> &Arc<dyn Directory> {
        &self.inner.directory
    }

    /// Opstamp of the commit new searchers see
    pub fn visible_opstamp(&self) -> u64 {
        self.inner.visible.load().opstamp
    }

    /// Allocate the next opstamp
    pub(crate) fn next_opstamp(&self) -> u64 {
        self.inner.opstamp.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Keep allocating above an opstamp made durable elsewhere
    pub(crate) fn observe_opstamp(&self, opstamp: u64) {
        self.inner.opstamp.fetch_max(opstamp, Ordering::SeqCst);
    }

    pub(crate) fn reload_policy(&self) -> ReloadPolicy {
        self.inner.reader_config.read().reload_policy
    }

    /// Open the single writer with default options
    ///
    /// `heap_size` is the buffered byte budget that triggers a background
    /// flush; a `num_threads` of zero means one thread.
    pub fn writer(&self, heap_size: usize, num_threads: usize) -> Result<IndexWriter> {
        self.writer_with_config(WriterConfig::new(heap_size, num_threads))
    }

    pub fn writer_with_config(&self, config: WriterConfig) -> Result<IndexWriter> {
        let config = config.validate()?;
        self.acquire_writer_lock(config.lock_wait)?;
        match IndexWriter::open(self.clone(), config) {
            Ok(writer) => Ok(writer),
            Err(e) => {
                self.release_writer_lock();
                Err(e)
            }
        }
    }

    fn acquire_writer_lock(&self, policy: LockWaitPolicy) -> Result<()> {
        let deadline = match policy {
            LockWaitPolicy::Fail => None,
            LockWaitPolicy::Block(timeout) => Some(Instant::now() + timeout),
        };
        loop {
            if self.try_acquire_writer_lock()? {
                return Ok(());
            }
            match deadline {
                Some(deadline) if Instant::now() < deadline => thread::sleep(LOCK_RETRY_INTERVAL),
                _ => return Err(ShowdexError::WriterConflict),
            }
        }
    }

    fn try_acquire_writer_lock(&self) -> Result<bool> {
        if self
            .inner
            .writer_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        match self.inner.directory.try_acquire_writer_lock() {
            Ok(true) => Ok(true),
            other => {
                self.inner.writer_open.store(false, Ordering::Release);
                other
            }
        }
    }

    pub(crate) fn release_writer_lock(&self) {
        if let Err(e) = self.inner.directory.release_writer_lock() {
            tracing::warn!(error = %e, "Failed to release writer lock");
        }
        self.inner.writer_open.store(false, Ordering::Release);
    }

    /// Configure reloading and the searcher pool
    ///
    /// `reload_policy` is `"oncommit"` or `"manual"`.
    pub fn config_reader(&self, reload_policy: &str, num_searchers: usize) -> Result<()> {
        let config = ReaderConfig::default()
            .with_reload_policy(ReloadPolicy::from_name(reload_policy)?)
            .with_num_searchers(num_searchers)
            .validate()?;
        debug!(?config, "Reader configured");
        *self.inner.reader_config.write() = config;
        self.rebuild_pool(self.inner.visible.load_full());
        Ok(())
    }

    pub fn reader_config(&self) -> ReaderConfig {
        self.inner.reader_config.read().clone()
    }

    /// Publish the latest durable commit to new searchers
    ///
    /// A no-op when the visible generation is already the durable one.
    pub fn reload(&self) -> Result<()> {
        let _guard = self.inner.reload_lock.lock();
        let meta = IndexMeta::load(self.inner.directory.as_ref())?
            .ok_or_else(|| ShowdexError::Corrupt(format!("{} is missing", META_FILE)))?;
        let visible = self.inner.visible.load();
        if meta.generation == visible.generation {
            debug!(generation = meta.generation, "Reload skipped, already current");
            return Ok(());
        }
        let segments = self.load_segment_set(&meta)?;
        info!(
            from = visible.generation,
            to = meta.generation,
            segments = segments.entries.len(),
            "Reloaded index"
        );
        drop(visible);
        self.publish(segments);
        Ok(())
    }

    /// A searcher over the visible segment set, from the pool in turn
    pub fn searcher(&self) -> Searcher {
        let pool = self.inner.searchers.load();
        let i = self.inner.next_searcher.fetch_add(1, Ordering::Relaxed);
        match pool.get(i % pool.len().max(1)) {
            Some(searcher) => searcher.clone(),
            None => Searcher::new(
                self.inner.schema.clone(),
                self.inner.visible.load_full(),
                self.inner.bm25,
            ),
        }
    }

    /// Parse a query string against this index's schema
    pub fn parse_query(&self, text: &str, default_field_names: &[&str]) -> Result<Query> {
        parse_query(&self.inner.schema, text, default_field_names)
    }

    /// Open (or reuse) the readers and tombstones named by `meta`
    fn load_segment_set(&self, meta: &IndexMeta) -> Result<SegmentSet> {
        let visible = self.inner.visible.load();
        let mut cache = self.inner.readers.lock();
        let mut entries = Vec::with_capacity(meta.segments.len());
        for segment in &meta.segments {
            let reader = self.open_segment(&mut cache, segment)?;
            let unchanged = visible
                .entries
                .iter()
                .find(|e| e.meta.id == segment.id && e.meta.del_gen == segment.del_gen);
            let deletes = match unchanged {
                Some(entry) => entry.deletes.clone(),
                None => Arc::new(read_deletes(self.inner.directory.as_ref(), segment)?),
            };
            entries.push(SegmentEntry {
                meta: segment.clone(),
                reader,
                deletes,
            });
        }
        cache.retain(|id, _| meta.segment(*id).is_some());
        Ok(SegmentSet::new(meta.generation, meta.opstamp, entries))
    }

    fn open_segment(
        &self,
        cache: &mut HashMap<SegmentId, Arc<SegmentReader>>,
        meta: &SegmentMeta,
    ) -> Result<Arc<SegmentReader>> {
        if let Some(reader) = cache.get(&meta.id) {
            return Ok(reader.clone());
        }
        let reader = Arc::new(SegmentReader::open(
            self.inner.directory.as_ref(),
            meta,
            self.inner.schema.clone(),
        )?);
        cache.insert(meta.id, reader.clone());
        Ok(reader)
    }

    /// Reader of a durable segment, for applying deletes at commit
    pub(crate) fn segment_reader(&self, meta: &SegmentMeta) -> Result<Arc<SegmentReader>> {
        let mut cache = self.inner.readers.lock();
        self.open_segment(&mut cache, meta)
    }

    /// Tombstones a durable segment currently carries
    pub(crate) fn segment_deletes(&self, meta: &SegmentMeta) -> Result<RoaringBitmap> {
        read_deletes(self.inner.directory.as_ref(), meta)
    }

    fn publish(&self, segments: SegmentSet) {
        let segments = Arc::new(segments);
        self.inner.visible.store(segments.clone());
        self.rebuild_pool(segments);
    }

    fn rebuild_pool(&self, segments: Arc<SegmentSet>) {
        let size = self.inner.reader_config.read().num_searchers.max(1);
        let pool = (0..size)
            .map(|_| {
                Searcher::new(
                    self.inner.schema.clone(),
                    segments.clone(),
                    self.inner.bm25,
                )
            })
            .collect::<Vec<_>>();
        self.inner.searchers.store(Arc::new(pool));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::schema::TextOptions;

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder
            .add_text_field("title", TextOptions::text().with_stored())
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_create_in_memory() {
        let index = Index::create(schema(), None, false).unwrap();
        assert!(index.directory_path().is_none());
        assert_eq!(index.visible_opstamp(), 0);
        assert_eq!(index.searcher().num_docs(), 0);
        assert_eq!(index.searcher().num_segments(), 0);
    }

    #[test]
    fn test_create_and_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx");
        assert!(!Index::exists(&path));

        let index = Index::create(schema(), Some(&path), false).unwrap();
        assert!(Index::exists(&path));
        assert_eq!(index.directory_path(), Some(path.clone()));
        drop(index);

        assert!(matches!(
            Index::create(schema(), Some(&path), false),
            Err(ShowdexError::IndexExists(_))
        ));
        assert!(Index::create(schema(), Some(&path), true).is_ok());

        let mut other = Schema::builder();
        other.add_text_field("body", TextOptions::text()).unwrap();
        assert!(matches!(
            Index::create(other.build(), Some(&path), true),
            Err(ShowdexError::SchemaIncompatible(_))
        ));
    }

    #[test]
    fn test_open_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Index::open(&dir.path().join("missing")),
            Err(ShowdexError::NotFound(_))
        ));

        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        assert!(matches!(
            Index::create(schema(), Some(dir.path()), false),
            Err(ShowdexError::Corrupt(_))
        ));

        let broken = dir.path().join("broken");
        Index::create(schema(), Some(&broken), false).unwrap();
        std::fs::write(broken.join(SCHEMA_FILE), "{").unwrap();
        assert!(matches!(Index::open(&broken), Err(ShowdexError::Corrupt(_))));
    }

    #[test]
    fn test_config_reader() {
        let index = Index::create(schema(), None, false).unwrap();
        assert!(matches!(
            index.config_reader("sometimes", 2),
            Err(ShowdexError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.config_reader("manual", 0),
            Err(ShowdexError::InvalidArgument(_))
        ));
        index.config_reader("manual", 3).unwrap();
        assert_eq!(index.reader_config().reload_policy, ReloadPolicy::Manual);
        assert_eq!(index.reader_config().num_searchers, 3);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let index = Index::create(schema(), None, false).unwrap();
        index.config_reader("manual", 1).unwrap();
        let mut writer = index.writer(1 << 20, 1).unwrap();
        let mut doc = Document::new();
        doc.add_text("title", "hello");
        writer.add_document(doc).unwrap();
        writer.commit().unwrap();

        assert_eq!(index.searcher().num_docs(), 0);
        index.reload().unwrap();
        let generation = index.searcher().generation();
        index.reload().unwrap();
        assert_eq!(index.searcher().generation(), generation);
        assert_eq!(index.searcher().num_docs(), 1);
    }
}
