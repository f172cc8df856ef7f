use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::Directory;
use crate::Result;

/// In-memory directory for ephemeral indexes
#[derive(Debug, Default)]
pub struct RamDirectory {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
    locked: AtomicBool,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for RamDirectory {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
            .into()
        })
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.files.write().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.files.write().remove(path);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn try_acquire_writer_lock(&self) -> Result<bool> {
        Ok(self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    fn release_writer_lock(&self) -> Result<()> {
        self.locked.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_directory() {
        let dir = RamDirectory::new();
        assert!(dir.read(Path::new("meta.json")).is_err());

        dir.atomic_write(Path::new("meta.json"), b"{}").unwrap();
        assert!(dir.exists(Path::new("meta.json")));
        assert_eq!(dir.read(Path::new("meta.json")).unwrap(), b"{}");

        dir.delete(Path::new("meta.json")).unwrap();
        assert!(dir.list_files().unwrap().is_empty());
        assert!(dir.root().is_none());
    }

    #[test]
    fn test_ram_lock() {
        let dir = RamDirectory::new();
        assert!(dir.try_acquire_writer_lock().unwrap());
        assert!(!dir.try_acquire_writer_lock().unwrap());
        dir.release_writer_lock().unwrap();
        assert!(dir.try_acquire_writer_lock().unwrap());
    }
}
