//! Storage collaborator: opens seekable byte streams by path.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Seekable byte stream handed out by a `Storage`.
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

pub trait Storage: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn SeekRead>>;

    fn len(&self, path: &Path) -> Result<u64>;

    /// Open and position at `offset`.
    fn open_at(&self, path: &Path, offset: u64) -> Result<Box<dyn SeekRead>> {
        let mut s = self.open(path)?;
        s.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seek {} to {}", path.display(), offset))?;
        Ok(s)
    }
}

/// Local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Storage for LocalFs {
    fn open(&self, path: &Path) -> Result<Box<dyn SeekRead>> {
        let f = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open {}", path.display()))?;
        Ok(Box::new(f))
    }

    fn len(&self, path: &Path) -> Result<u64> {
        let md = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        Ok(md.len())
    }
}

#[derive(Clone, Debug)]
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// In-memory files keyed by path.
#[derive(Debug, Default)]
pub struct MemStorage {
    files: RwLock<HashMap<PathBuf, Arc<Vec<u8>>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.as_ref().to_path_buf(), Arc::new(data.into()));
        }
    }

    fn get(&self, path: &Path) -> Result<Arc<Vec<u8>>> {
        let files = self
            .files
            .read()
            .map_err(|_| anyhow!("mem storage lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("open {}: no such file", path.display()))
    }
}

impl Storage for MemStorage {
    fn open(&self, path: &Path) -> Result<Box<dyn SeekRead>> {
        Ok(Box::new(Cursor::new(SharedBytes(self.get(path)?))))
    }

    fn len(&self, path: &Path) -> Result<u64> {
        Ok(self.get(path)?.len() as u64)
    }
}
