use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Directory, WRITER_LOCK_FILE};
use crate::Result;

/// Directory backed by a filesystem path
#[derive(Debug)]
pub struct FsDirectory {
    root: PathBuf,
    /// Open handle holding the OS lock on `.writer.lock`
    writer_lock: Mutex<Option<File>>,
}

impl FsDirectory {
    /// Open (creating if needed) a directory at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            writer_lock: Mutex::new(None),
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn sync_dir(dir: &Path) {
        if let Ok(handle) = File::open(dir) {
            let _ = handle.sync_all();
        }
    }

    fn collect(&self, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                out.push(relative.to_path_buf());
            }
        }
        Ok(())
    }
}

impl Directory for FsDirectory {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path))?)
    }

    /// Write `<file>.tmp`, fsync it, rename over the target, fsync the parent
    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let mut tmp_name = target.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &target)?;
        Self::sync_dir(&parent);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Drop the segment directory once its last file is gone
        if let Some(parent) = full.parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.collect(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Take an exclusive OS lock on `.writer.lock`
    ///
    /// The kernel drops the lock when the process exits, so a lock file
    /// left by a crashed writer does not block the next one.
    fn try_acquire_writer_lock(&self) -> Result<bool> {
        let mut held = self.writer_lock.lock();
        if held.is_some() {
            return Ok(false);
        }
        let path = self.root.join(WRITER_LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                debug!(path = %path.display(), "Writer lock held elsewhere");
                return Ok(false);
            }
            return Err(e.into());
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        *held = Some(file);
        debug!(path = %path.display(), "Writer lock acquired");
        Ok(true)
    }

    /// Unlock and close the lock file; the file itself stays in place
    fn release_writer_lock(&self) -> Result<()> {
        let Some(file) = self.writer_lock.lock().take() else {
            return Ok(());
        };
        if let Err(e) = FileExt::unlock(&file) {
            warn!(root = %self.root.display(), error = %e, "Failed to release writer lock");
            return Err(e.into());
        }
        Ok(())
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_and_read() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();

        dir.atomic_write(Path::new("seg_1/a.bin"), b"one").unwrap();
        dir.atomic_write(Path::new("seg_1/a.bin"), b"two").unwrap();
        assert_eq!(dir.read(Path::new("seg_1/a.bin")).unwrap(), b"two");
        assert!(!temp.path().join("seg_1/a.bin.tmp").exists());
        assert_eq!(dir.list_files().unwrap(), vec![PathBuf::from("seg_1/a.bin")]);
    }

    #[test]
    fn test_delete_removes_empty_segment_dir() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();

        dir.atomic_write(Path::new("seg_2/x.bin"), b"x").unwrap();
        dir.delete(Path::new("seg_2/x.bin")).unwrap();
        assert!(!temp.path().join("seg_2").exists());
        dir.delete(Path::new("seg_2/x.bin")).unwrap();
    }

    #[test]
    fn test_writer_lock() {
        let temp = TempDir::new().unwrap();
        let dir = FsDirectory::open(temp.path()).unwrap();

        assert!(dir.try_acquire_writer_lock().unwrap());
        assert!(!dir.try_acquire_writer_lock().unwrap());
        dir.release_writer_lock().unwrap();
        assert!(dir.try_acquire_writer_lock().unwrap());
    }

    #[test]
    fn test_writer_lock_across_handles() {
        let temp = TempDir::new().unwrap();
        let first = FsDirectory::open(temp.path()).unwrap();
        let second = FsDirectory::open(temp.path()).unwrap();

        assert!(first.try_acquire_writer_lock().unwrap());
        assert!(!second.try_acquire_writer_lock().unwrap());
        first.release_writer_lock().unwrap();
        assert!(second.try_acquire_writer_lock().unwrap());
        assert!(!first.try_acquire_writer_lock().unwrap());

        // Closing the handle frees the lock without an explicit release
        drop(second);
        assert!(first.try_acquire_writer_lock().unwrap());
    }

    #[test]
    fn test_stale_lock_file_is_not_a_lock() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(WRITER_LOCK_FILE), b"4242\n").unwrap();

        let dir = FsDirectory::open(temp.path()).unwrap();
        assert!(dir.try_acquire_writer_lock().unwrap());
        let pid = std::fs::read_to_string(temp.path().join(WRITER_LOCK_FILE)).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
    }
}
