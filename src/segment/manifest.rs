//! Index manifest
//!
//! `meta.json` names the durable segment set. Writing it (atomically) is
//! the commit point: files not named by the current manifest are garbage.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::SegmentId;
use crate::directory::Directory;
use crate::error::ShowdexError;
use crate::Result;

pub const META_FILE: &str = "meta.json";
pub const SCHEMA_FILE: &str = "schema.json";

/// Manifest format version written by this crate
pub const FORMAT_VERSION: u32 = 1;

/// Durable description of one segment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: SegmentId,
    pub num_docs: u32,
    /// Tombstoned docs as of `del_gen`
    pub num_deleted: u32,
    /// Generation of the current tombstone file, if any
    pub del_gen: Option<u64>,
    /// crc32 over the segment's files
    pub checksum: u32,
}

impl SegmentMeta {
    pub fn live_docs(&self) -> u32 {
        self.num_docs.saturating_sub(self.num_deleted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    /// Incremented by every commit
    pub generation: u64,
    /// Opstamp of the last commit
    pub opstamp: u64,
    pub next_segment_id: u64,
    pub segments: Vec<SegmentMeta>,
}

impl Default for IndexMeta {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generation: 0,
            opstamp: 0,
            next_segment_id: 0,
            segments: Vec::new(),
        }
    }
}

impl IndexMeta {
    pub fn allocate_segment_id(&mut self) -> SegmentId {
        let id = SegmentId(self.next_segment_id);
        self.next_segment_id += 1;
        id
    }

    pub fn segment(&self, id: SegmentId) -> Option<&SegmentMeta> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn total_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs as u64).sum()
    }

    pub fn live_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.live_docs() as u64).sum()
    }

    /// Read `meta.json`; `None` if the directory holds no index
    pub fn load(directory: &dyn Directory) -> Result<Option<IndexMeta>> {
        let bytes = match directory.read(Path::new(META_FILE)) {
            Ok(bytes) => bytes,
            Err(ShowdexError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let meta: IndexMeta = serde_json::from_slice(&bytes)
            .map_err(|e| ShowdexError::Corrupt(format!("unreadable {}: {}", META_FILE, e)))?;
        if meta.format_version != FORMAT_VERSION {
            return Err(ShowdexError::Corrupt(format!(
                "unsupported format version {}",
                meta.format_version
            )));
        }
        meta.check()?;
        Ok(Some(meta))
    }

    /// Internal consistency of the manifest itself
    fn check(&self) -> Result<()> {
        for (i, segment) in self.segments.iter().enumerate() {
            if segment.id.0 >= self.next_segment_id {
                return Err(ShowdexError::Corrupt(format!(
                    "segment {} is not below next_segment_id {}",
                    segment.id, self.next_segment_id
                )));
            }
            if segment.num_deleted > segment.num_docs {
                return Err(ShowdexError::Corrupt(format!(
                    "segment {} has more deletes than docs",
                    segment.id
                )));
            }
            if self.segments[..i].iter().any(|s| s.id == segment.id) {
                return Err(ShowdexError::Corrupt(format!(
                    "segment {} is listed twice",
                    segment.id
                )));
            }
        }
        Ok(())
    }

    /// Atomically replace `meta.json`
    pub fn save(&self, directory: &dyn Directory) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        directory.atomic_write(Path::new(META_FILE), &bytes)
    }
}
