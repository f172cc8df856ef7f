//! Tombstone bitsets
//!
//! Deletes never rewrite a segment: each commit that deletes from a segment
//! writes a fresh `deletes.<gen>.bin` roaring bitmap holding every
//! tombstoned doc id, and the manifest points at the newest generation.

use roaring::RoaringBitmap;

use super::manifest::SegmentMeta;
use super::types::SegmentId;
use crate::directory::Directory;
use crate::error::ShowdexError;
use crate::Result;

pub fn write_deletes(
    directory: &dyn Directory,
    segment: SegmentId,
    del_gen: u64,
    deleted: &RoaringBitmap,
) -> Result<()> {
    let mut bytes = Vec::with_capacity(deleted.serialized_size());
    deleted.serialize_into(&mut bytes)?;
    directory.atomic_write(&segment.deletes_file(del_gen), &bytes)
}

/// Tombstones of a segment as named by its manifest entry
pub fn read_deletes(directory: &dyn Directory, meta: &SegmentMeta) -> Result<RoaringBitmap> {
    let Some(del_gen) = meta.del_gen else {
        return Ok(RoaringBitmap::new());
    };
    let bytes = directory.read(&meta.id.deletes_file(del_gen))?;
    let deleted = RoaringBitmap::deserialize_from(&bytes[..]).map_err(|e| {
        ShowdexError::Corrupt(format!("unreadable deletes of {}: {}", meta.id, e))
    })?;
    if deleted.len() != meta.num_deleted as u64 {
        return Err(ShowdexError::Corrupt(format!(
            "deletes of {} hold {} docs, manifest says {}",
            meta.id,
            deleted.len(),
            meta.num_deleted
        )));
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::RamDirectory;

    #[test]
    fn test_deletes_round_trip() {
        let dir = RamDirectory::new();
        let mut deleted = RoaringBitmap::new();
        deleted.insert(3);
        deleted.insert(7);
        write_deletes(&dir, SegmentId(1), 4, &deleted).unwrap();

        let mut meta = SegmentMeta {
            id: SegmentId(1),
            num_docs: 10,
            num_deleted: 2,
            del_gen: Some(4),
            checksum: 0,
        };
        assert_eq!(read_deletes(&dir, &meta).unwrap(), deleted);

        meta.num_deleted = 3;
        assert!(read_deletes(&dir, &meta).is_err());

        meta.del_gen = None;
        assert!(read_deletes(&dir, &meta).unwrap().is_empty());
    }
}
