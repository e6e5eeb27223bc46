// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;

pub mod mock;

/// Abstract filesystem interface.
///
/// The incremental cache only ever needs a path's existence and its last
/// modification time, plus whole-file reads and atomic replacement for its
/// persisted table.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace `path` with `contents` so that readers see either the old or
    /// the new file, never a partial write.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Last modification time in milliseconds since the Unix epoch.
    fn modified_millis(&self, path: &Path) -> Result<i64>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;

        // Stage next to the destination so the final rename never crosses
        // filesystems.
        let mut staged = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {:?}", parent))?;
        staged
            .write_all(contents)
            .with_context(|| format!("writing temp file for {:?}", path))?;
        staged
            .as_file()
            .sync_all()
            .with_context(|| format!("syncing temp file for {:?}", path))?;
        staged
            .persist(path)
            .map_err(|e| anyhow!("replacing {:?}: {}", path, e.error))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn modified_millis(&self, path: &Path) -> Result<i64> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("reading modification time of {:?}", path))?;
        let millis = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(before_epoch) => -(before_epoch.duration().as_millis() as i64),
        };
        Ok(millis)
    }
}
