//! Storage abstraction for index files
//!
//! An index lives in a [`Directory`]: either a filesystem directory
//! ([`FsDirectory`]) or an in-memory one ([`RamDirectory`]) for ephemeral
//! indexes. Paths are relative to the directory root.

mod fs;
mod ram;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

pub use fs::FsDirectory;
pub use ram::RamDirectory;

use crate::Result;

/// Name of the writer lock file
pub const WRITER_LOCK_FILE: &str = ".writer.lock";

pub trait Directory: Send + Sync + Debug {
    /// Read a whole file; `NotFound` io errors for missing files
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace a file so readers see either the old or the new content
    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Delete a file; deleting a missing file is not an error
    fn delete(&self, path: &Path) -> Result<()>;

    /// All files, recursively, relative to the root
    fn list_files(&self) -> Result<Vec<PathBuf>>;

    /// Take the exclusive writer lock; `false` if someone else holds it
    fn try_acquire_writer_lock(&self) -> Result<bool>;

    fn release_writer_lock(&self) -> Result<()>;

    /// Filesystem root, `None` for in-memory directories
    fn root(&self) -> Option<&Path> {
        None
    }
}
