use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ShowdexError;
use crate::Result;

/// Smallest accepted writer heap budget
pub const MIN_HEAP_SIZE: usize = 1024;

/// Default writer heap budget (50 MiB)
pub const DEFAULT_HEAP_SIZE: usize = 50 * 1024 * 1024;

/// BM25 parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter (typically 1.2-2.0)
    pub k1: f32,
    /// Length normalization parameter (0.0 = no normalization, 1.0 = full)
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// What a second writer does while another writer holds the lock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LockWaitPolicy {
    /// Fail at once with `WriterConflict`
    #[default]
    Fail,
    /// Retry until the timeout, then fail with `WriterConflict`
    Block(Duration),
}

/// Index writer configuration
#[derive(Clone, Debug)]
pub struct WriterConfig {
    /// Buffered bytes that trigger a background flush
    pub heap_size: usize,
    /// Threads used to build segments
    pub num_threads: usize,
    pub lock_wait: LockWaitPolicy,
    /// Drop unknown keys in `add_json` instead of failing
    pub ignore_unknown_fields: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
            num_threads: 1,
            lock_wait: LockWaitPolicy::Fail,
            ignore_unknown_fields: false,
        }
    }
}

impl WriterConfig {
    pub fn new(heap_size: usize, num_threads: usize) -> Self {
        Self {
            heap_size,
            num_threads,
            ..Default::default()
        }
    }

    pub fn with_lock_wait(mut self, policy: LockWaitPolicy) -> Self {
        self.lock_wait = policy;
        self
    }

    pub fn with_ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }

    /// Check limits; a thread count of zero is read as one
    pub fn validate(mut self) -> Result<Self> {
        if self.heap_size < MIN_HEAP_SIZE {
            return Err(ShowdexError::InvalidArgument(format!(
                "heap_size must be at least {} bytes, got {}",
                MIN_HEAP_SIZE, self.heap_size
            )));
        }
        self.num_threads = self.num_threads.max(1);
        Ok(self)
    }
}

/// When committed segments become visible to new searchers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicy {
    /// Reload right after every commit
    #[default]
    OnCommit,
    /// Only on an explicit `reload()`
    Manual,
}

impl ReloadPolicy {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "oncommit" => Ok(ReloadPolicy::OnCommit),
            "manual" => Ok(ReloadPolicy::Manual),
            other => Err(ShowdexError::InvalidArgument(format!(
                "unknown reload policy '{}', expected 'oncommit' or 'manual'",
                other
            ))),
        }
    }
}

/// Reader configuration
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    pub reload_policy: ReloadPolicy,
    /// Number of pooled searcher snapshots
    pub num_searchers: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            reload_policy: ReloadPolicy::OnCommit,
            num_searchers: num_cpus::get(),
        }
    }
}

impl ReaderConfig {
    pub fn with_reload_policy(mut self, policy: ReloadPolicy) -> Self {
        self.reload_policy = policy;
        self
    }

    pub fn with_num_searchers(mut self, num_searchers: usize) -> Self {
        self.num_searchers = num_searchers;
        self
    }

    pub fn validate(self) -> Result<Self> {
        if self.num_searchers == 0 {
            return Err(ShowdexError::InvalidArgument(
                "num_searchers must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let writer = WriterConfig::default();
        assert_eq!(writer.heap_size, DEFAULT_HEAP_SIZE);
        assert_eq!(writer.lock_wait, LockWaitPolicy::Fail);

        let reader = ReaderConfig::default();
        assert_eq!(reader.reload_policy, ReloadPolicy::OnCommit);
        assert!(reader.num_searchers >= 1);

        let bm25 = Bm25Params::default();
        assert_eq!(bm25.k1, 1.2);
        assert_eq!(bm25.b, 0.75);
    }

    #[test]
    fn test_writer_config_validation() {
        assert!(WriterConfig::new(100, 1).validate().is_err());
        let config = WriterConfig::new(MIN_HEAP_SIZE, 0).validate().unwrap();
        assert_eq!(config.num_threads, 1);
    }

    #[test]
    fn test_reader_config_builder() {
        let config = ReaderConfig::default()
            .with_reload_policy(ReloadPolicy::Manual)
            .with_num_searchers(2)
            .validate()
            .unwrap();
        assert_eq!(config.reload_policy, ReloadPolicy::Manual);
        assert_eq!(config.num_searchers, 2);

        assert!(ReaderConfig::default().with_num_searchers(0).validate().is_err());
    }

    #[test]
    fn test_reload_policy_names() {
        assert_eq!(ReloadPolicy::from_name("oncommit").unwrap(), ReloadPolicy::OnCommit);
        assert_eq!(ReloadPolicy::from_name("manual").unwrap(), ReloadPolicy::Manual);
        assert!(ReloadPolicy::from_name("eventually").is_err());
    }
}
