//! Directory-backed staging store
//!
//! One regular file per staged object under `cache_dir`. With
//! `prefix_depth > 0` the object name is a slash-separated relative path and
//! intermediate directories are created on write. A name is reachable via
//! [`StagingStore::list_all`] exactly until the successful-upload callback
//! removes it.

use crate::residency::ResidencyIndex;
use bytes::Bytes;
use driftfs_common::{Error, Result, WriteCacheConfig};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

pub struct StagingStore {
    cache_dir: PathBuf,
    prefix_depth: u32,
    residency: Arc<ResidencyIndex>,
}

impl StagingStore {
    /// Create a store over `cfg.cache_dir`, creating the directory if needed.
    pub fn new(cfg: &WriteCacheConfig, residency: Arc<ResidencyIndex>) -> Result<Self> {
        fs::create_dir_all(&cfg.cache_dir)?;
        Ok(Self {
            cache_dir: cfg.cache_dir.clone(),
            prefix_depth: cfg.prefix_depth,
            residency: Arc::clone(&residency),
        })
    }

    /// The cache directory still exists
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cache_dir.is_dir()
    }

    #[must_use]
    pub fn prefix_depth(&self) -> u32 {
        self.prefix_depth
    }

    #[must_use]
    pub fn residency(&self) -> &Arc<ResidencyIndex> {
        &self.residency
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    /// Persist one staged object. Returns the number of bytes written.
    pub fn write(&self, name: &str, data: &[u8], fsync: bool) -> Result<u64> {
        let path = self.full_path(name);
        if self.prefix_depth > 0 {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    error!(name, error = %e, "create staging directories failed");
                    Error::CacheIo(e)
                })?;
            }
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                error!(name, error = %e, "open staged file for write failed");
                Error::CacheIo(e)
            })?;
        file.write_all(data).map_err(|e| {
            error!(name, error = %e, "write staged file failed");
            Error::CacheIo(e)
        })?;
        if fsync {
            file.sync_data().map_err(|e| {
                error!(name, error = %e, "sync staged file failed");
                Error::CacheIo(e)
            })?;
        }
        debug!(name, length = data.len(), fsync, "staged write complete");
        Ok(data.len() as u64)
    }

    /// Read one staged object into an owned buffer.
    /// The file size is taken from a stat; a shorter read is an error.
    pub fn read(&self, name: &str) -> Result<Bytes> {
        let path = self.full_path(name);
        let meta = fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::StagedObjectNotFound(name.to_string())
            } else {
                error!(name, error = %e, "stat staged file failed");
                Error::CacheIo(e)
            }
        })?;
        let expected = meta.len();
        let mut file = File::open(&path)?;
        let mut buf = vec![0u8; expected as usize];
        let mut got: usize = 0;
        while got < buf.len() {
            let n = file.read(&mut buf[got..])?;
            if n == 0 {
                return Err(Error::ShortRead {
                    name: name.to_string(),
                    got: got as u64,
                    expected,
                });
            }
            got += n;
        }
        Ok(Bytes::from(buf))
    }

    /// Unlink one staged object and demote its residency entry.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.full_path(name);
        fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::StagedObjectNotFound(name.to_string())
            } else {
                error!(name, error = %e, "remove staged file failed");
                Error::CacheIo(e)
            }
        })?;
        self.residency.move_to_back(name);
        debug!(name, "removed staged file");
        Ok(())
    }

    /// Whether the staged object is present on disk
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.full_path(name).is_file()
    }

    /// Enumerate every staged object, depth first. Directory descent keeps
    /// the full relative path as the logical name.
    pub fn list_all(&self) -> Result<BTreeSet<String>> {
        if !self.is_valid() {
            return Err(Error::CacheDirInvalid(
                self.cache_dir.display().to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        self.list_dir(&self.cache_dir, "", &mut names)?;
        Ok(names)
    }

    fn list_dir(&self, dir: &Path, rel: &str, out: &mut BTreeSet<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let rel_name = if rel.is_empty() {
                file_name.to_string()
            } else {
                format!("{rel}/{file_name}")
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.list_dir(&entry.path(), &rel_name, out)?;
            } else if file_type.is_file() {
                out.insert(rel_name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(prefix_depth: u32) -> (TempDir, StagingStore) {
        let dir = TempDir::new().unwrap();
        let cfg = WriteCacheConfig {
            cache_dir: dir.path().to_path_buf(),
            prefix_depth,
            ..Default::default()
        };
        let store = StagingStore::new(&cfg, Arc::new(ResidencyIndex::new())).unwrap();
        (dir, store)
    }

    #[test]
    fn test_write_read_round_trip() {
        let (_dir, store) = store(0);
        let written = store.write("42_1_0", b"hello", true).unwrap();
        assert_eq!(written, 5);
        assert!(store.exists("42_1_0"));
        assert_eq!(store.read("42_1_0").unwrap().as_ref(), b"hello");
    }

    #[test]
    fn test_write_creates_prefix_dirs() {
        let (_dir, store) = store(2);
        store.write("42/7/0", b"body", false).unwrap();
        assert!(store.exists("42/7/0"));
        let names = store.list_all().unwrap();
        assert!(names.contains("42/7/0"));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_dir, store) = store(0);
        let err = store.read("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_demotes_residency() {
        let (_dir, store) = store(0);
        store.residency().insert("a_1_0");
        store.residency().insert("a_1_1");
        store.write("a_1_1", b"x", false).unwrap();
        store.remove("a_1_1").unwrap();
        assert!(!store.exists("a_1_1"));
        // demoted entry is now the oldest
        assert_eq!(store.residency().pop_oldest().as_deref(), Some("a_1_1"));
    }

    #[test]
    fn test_remove_missing_is_error_but_index_intact() {
        let (_dir, store) = store(0);
        store.residency().insert("present");
        let err = store.remove("absent").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.residency().len(), 1);
    }

    #[test]
    fn test_list_all_recurses() {
        let (_dir, store) = store(2);
        store.write("1/0/0", b"a", false).unwrap();
        store.write("1/0/1", b"b", false).unwrap();
        store.write("2/5/0", b"c", false).unwrap();
        let names = store.list_all().unwrap();
        assert_eq!(names.len(), 3);
        assert!(names.contains("1/0/1"));
        assert!(names.contains("2/5/0"));
    }

    #[test]
    fn test_list_all_after_dir_removed() {
        let dir = TempDir::new().unwrap();
        let cfg = WriteCacheConfig {
            cache_dir: dir.path().join("cache"),
            ..Default::default()
        };
        let store = StagingStore::new(&cfg, Arc::new(ResidencyIndex::new())).unwrap();
        fs::remove_dir_all(dir.path().join("cache")).unwrap();
        assert!(!store.is_valid());
        assert!(store.list_all().is_err());
    }
}
