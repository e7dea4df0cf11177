//! Durable tier of the generation cache.

use crate::entry::{CacheEntry, IndexRecord};
use crate::key::CacheKey;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("cache storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("cache record is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("cache quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: u64, quota: u64 },
}

/// Key/value store for entries plus the recency index.
pub trait CacheStorage {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError>;
    fn set(&mut self, key: &CacheKey, entry: &CacheEntry) -> Result<(), StorageError>;
    fn remove(&mut self, key: &CacheKey) -> Result<(), StorageError>;
    fn list_index(&self) -> Result<Vec<IndexRecord>, StorageError>;
    fn write_index(&mut self, index: &[IndexRecord]) -> Result<(), StorageError>;
    /// Keys of every stored entry, whatever the index says.
    fn list_keys(&self) -> Result<Vec<CacheKey>, StorageError>;
}

fn check_quota(quota: Option<u64>, needed: u64) -> Result<(), StorageError> {
    match quota {
        Some(quota) if needed > quota => Err(StorageError::QuotaExceeded { needed, quota }),
        _ => Ok(()),
    }
}

/// In-process storage holding serialized entries; the quota counts entry bytes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: HashMap<CacheKey, Vec<u8>>,
    index: Vec<IndexRecord>,
    quota: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota: Some(quota_bytes),
            ..Self::default()
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.blobs.values().map(|b| b.len() as u64).sum()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.blobs.contains_key(key)
    }
}

impl CacheStorage for MemoryStorage {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        self.blobs
            .get(key)
            .map(|blob| serde_json::from_slice(blob))
            .transpose()
            .map_err(StorageError::from)
    }

    fn set(&mut self, key: &CacheKey, entry: &CacheEntry) -> Result<(), StorageError> {
        let blob = serde_json::to_vec(entry)?;
        let replaced = self.blobs.get(key).map_or(0, |b| b.len() as u64);
        check_quota(self.quota, self.used_bytes() - replaced + blob.len() as u64)?;
        self.blobs.insert(key.clone(), blob);
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), StorageError> {
        self.blobs.remove(key);
        Ok(())
    }

    fn list_index(&self) -> Result<Vec<IndexRecord>, StorageError> {
        Ok(self.index.clone())
    }

    fn write_index(&mut self, index: &[IndexRecord]) -> Result<(), StorageError> {
        self.index = index.to_vec();
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<CacheKey>, StorageError> {
        Ok(self.blobs.keys().cloned().collect())
    }
}

/// One JSON file per entry plus `index.json`, all in one directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota: None })
    }

    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota = Some(quota_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Bytes used by entry files, not counting the index.
    pub fn used_bytes(&self) -> Result<u64, StorageError> {
        let mut total = 0;
        for item in fs::read_dir(&self.dir)? {
            let item = item?;
            let name = item.file_name();
            let is_entry = Path::new(&name).extension().is_some_and(|ext| ext == "json")
                && name != INDEX_FILE;
            if is_entry {
                total += item.metadata()?.len();
            }
        }
        Ok(total)
    }

    /// Write through a temporary file so readers never see a torn record.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

impl CacheStorage for FileStorage {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        match read_optional(&self.entry_path(key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &CacheKey, entry: &CacheEntry) -> Result<(), StorageError> {
        let blob = serde_json::to_vec(entry)?;
        let path = self.entry_path(key);
        if self.quota.is_some() {
            let replaced = fs::metadata(&path).map_or(0, |m| m.len());
            let needed = self.used_bytes()? - replaced + blob.len() as u64;
            check_quota(self.quota, needed)?;
        }
        self.write_atomic(&path, &blob)
    }

    fn remove(&mut self, key: &CacheKey) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn list_index(&self) -> Result<Vec<IndexRecord>, StorageError> {
        match read_optional(&self.dir.join(INDEX_FILE))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_index(&mut self, index: &[IndexRecord]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(index)?;
        self.write_atomic(&self.dir.join(INDEX_FILE), &bytes)
    }

    fn list_keys(&self) -> Result<Vec<CacheKey>, StorageError> {
        let mut keys = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let name = item?.file_name();
            let key = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|stem| CacheKey::parse(stem).ok());
            keys.extend(key);
        }
        keys.sort();
        Ok(keys)
    }
}
