// src/cache/mod.rs

//! Incremental preprocessing cache.
//!
//! Maps an absolute input path to the modification time it had when it was
//! last processed. A file is skipped while its current modification time is
//! not newer than the stored one. Timestamps are epoch milliseconds; a
//! filesystem with coarser resolution than the edit interval can make an
//! edit invisible, which is accepted.
//!
//! The table sits behind a single mutex so that one cache can be shared by
//! concurrent invocations (`Arc<IncrementalCache>`).

pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;

pub use store::{CacheStore, FileCacheStore, MemoryCacheStore, PersistedCache};

/// Outcome of consulting the cache for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Already processed at or after its current modification time.
    Skip,
    /// Needs processing; `modified` is the timestamp observed now (if it
    /// could be read), to be recorded once processing succeeds.
    Proceed { modified: Option<i64> },
}

#[derive(Debug)]
pub struct IncrementalCache {
    fs: Arc<dyn FileSystem>,
    table: Mutex<BTreeMap<String, i64>>,
}

impl IncrementalCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            table: Mutex::new(BTreeMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<String, i64>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True iff a stored timestamp exists for `path` and is >= the file's
    /// current on-disk modification time. Unreadable files are never skipped.
    pub fn should_skip(&self, path: &Path) -> bool {
        matches!(self.decide(path), CacheDecision::Skip)
    }

    /// Like [`should_skip`](Self::should_skip), but also returns the observed
    /// modification time so the caller can record exactly what it processed.
    pub fn decide(&self, path: &Path) -> CacheDecision {
        let modified = match self.fs.modified_millis(path) {
            Ok(m) => m,
            Err(e) => {
                debug!(?path, error = %e, "cannot read modification time; not skipping");
                return CacheDecision::Proceed { modified: None };
            }
        };

        if self.is_up_to_date(path, modified) {
            debug!(?path, modified, "up to date; skipping");
            CacheDecision::Skip
        } else {
            CacheDecision::Proceed {
                modified: Some(modified),
            }
        }
    }

    /// Pure form of the skip check against a given modification time.
    pub fn is_up_to_date(&self, path: &Path, modified: i64) -> bool {
        self.table()
            .get(&cache_key(path))
            .is_some_and(|&stored| stored >= modified)
    }

    /// Unconditionally overwrite the stored timestamp for `path`.
    pub fn mark_processed(&self, path: &Path, observed_modified: i64) {
        let key = cache_key(path);
        debug!(path = %key, observed_modified, "marking processed");
        self.table().insert(key, observed_modified);
    }

    pub fn timestamp_of(&self, path: &Path) -> Option<i64> {
        self.table().get(&cache_key(path)).copied()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Snapshot of all entries, ordered by path.
    pub fn entries(&self) -> Vec<(String, i64)> {
        self.table()
            .iter()
            .map(|(path, ts)| (path.clone(), *ts))
            .collect()
    }

    pub fn clear(&self) {
        self.table().clear();
    }

    /// Replace the in-memory table with the persisted one.
    ///
    /// A store holding arrays of different lengths counts as "no cache" and
    /// leaves the table empty. Individual timestamps that are not integers
    /// are dropped. Relative paths are resolved against the current working
    /// directory, like every lookup. Returns the number of entries loaded.
    pub fn load(&self, store: &dyn CacheStore) -> Result<usize> {
        let Some(persisted) = store.read()? else {
            self.clear();
            return Ok(0);
        };

        let mut table = BTreeMap::new();
        if persisted.files.len() != persisted.timestamps.len() {
            warn!(
                files = persisted.files.len(),
                timestamps = persisted.timestamps.len(),
                "persisted cache arrays differ in length; ignoring cache"
            );
        } else {
            for (file, ts) in persisted.files.into_iter().zip(persisted.timestamps) {
                match ts.trim().parse::<i64>() {
                    Ok(ts) => {
                        table.insert(cache_key(Path::new(&file)), ts);
                    }
                    Err(e) => {
                        warn!(file = %file, timestamp = %ts, error = %e, "dropping cache entry with bad timestamp");
                    }
                }
            }
        }

        let loaded = table.len();
        *self.table() = table;
        info!(entries = loaded, "loaded incremental cache");
        Ok(loaded)
    }

    /// Persist the whole table, replacing whatever the store held.
    pub fn save(&self, store: &mut dyn CacheStore) -> Result<()> {
        let persisted = {
            let table = self.table();
            PersistedCache {
                files: table.keys().cloned().collect(),
                timestamps: table.values().map(i64::to_string).collect(),
            }
        };
        store.write(&persisted)
    }
}

/// Absolute, string form of `path` used as the table key.
fn cache_key(path: &Path) -> String {
    let absolute: PathBuf = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute.to_string_lossy().into_owned()
}
