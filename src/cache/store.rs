// src/cache/store.rs

//! Persistence backends for the incremental cache.
//!
//! On disk the table is a flat TOML document with two index-aligned arrays:
//!
//! ```toml
//! files = ["/addon/_main.cfg", "/addon/units/knight.cfg"]
//! timestamps = ["1718000000000", "1718000000500"]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, WmlkitError};
use crate::fs::FileSystem;

/// The persisted shape of the table: two parallel arrays, timestamps as
/// string-encoded integers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCache {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub timestamps: Vec<String>,
}

/// Abstract storage for the whole path -> timestamp table.
///
/// Reads and writes are always of the complete table; there is no per-entry
/// update.
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<PersistedCache>>;
    fn write(&mut self, table: &PersistedCache) -> Result<()>;
}

/// Stores the table in a TOML file, replaced atomically on every write.
pub struct FileCacheStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CacheStore for FileCacheStore {
    fn read(&self) -> Result<Option<PersistedCache>> {
        if !self.fs.exists(&self.path) {
            debug!(path = ?self.path, "no persisted cache");
            return Ok(None);
        }

        let contents = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| WmlkitError::CacheIo(format!("{e:#}")))?;
        let table: PersistedCache = toml::from_str(&contents).map_err(|e| {
            WmlkitError::CacheIo(format!("parsing cache file {:?}: {e}", self.path))
        })?;
        Ok(Some(table))
    }

    fn write(&mut self, table: &PersistedCache) -> Result<()> {
        let contents = toml::to_string(table)
            .map_err(|e| WmlkitError::CacheIo(format!("encoding cache table: {e}")))?;
        self.fs
            .write_atomic(&self.path, contents.as_bytes())
            .map_err(|e| WmlkitError::CacheIo(format!("{e:#}")))?;
        info!(path = ?self.path, entries = table.files.len(), "stored cache table (file)");
        Ok(())
    }
}

/// Keeps the table in memory only.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    table: Option<PersistedCache>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with a deliberately inconsistent table in tests.
    pub fn with_table(table: PersistedCache) -> Self {
        Self { table: Some(table) }
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self) -> Result<Option<PersistedCache>> {
        Ok(self.table.clone())
    }

    fn write(&mut self, table: &PersistedCache) -> Result<()> {
        self.table = Some(table.clone());
        debug!(entries = table.files.len(), "stored cache table (memory)");
        Ok(())
    }
}
