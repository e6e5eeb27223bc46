// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: i64 },
    Dir,
}

/// In-memory filesystem with explicitly controlled modification times.
///
/// Every write bumps an internal clock, so successive writes to the same
/// path always observe a strictly larger timestamp unless a test pins it
/// with [`MockFileSystem::set_modified`].
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<Mutex<i64>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(PathBuf::from("."), MockEntry::Dir);

        Self {
            entries: Arc::new(Mutex::new(entries)),
            clock: Arc::new(Mutex::new(0)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> i64 {
        let mut clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        *clock += 1;
        *clock
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let modified = self.tick();
        self.add_file_at(path, content, modified);
    }

    pub fn add_file_at(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>, modified: i64) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.entries();
        if let Some(parent) = path.parent() {
            ensure_dirs(&mut entries, parent);
        }
        entries.insert(
            path,
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        ensure_dirs(&mut self.entries(), path.as_ref());
    }

    /// Pin the modification time of an existing file.
    pub fn set_modified(&self, path: impl AsRef<Path>, millis: i64) {
        if let Some(MockEntry::File { modified, .. }) = self.entries().get_mut(path.as_ref()) {
            *modified = millis;
        }
    }
}

fn ensure_dirs(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        entries
            .entry(dir.to_path_buf())
            .or_insert(MockEntry::Dir);
        current = dir.parent();
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.entries().get(path) {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries().get(path), Some(MockEntry::Dir))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn modified_millis(&self, path: &Path) -> Result<i64> {
        match self.entries().get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir) => Ok(0),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }
}
