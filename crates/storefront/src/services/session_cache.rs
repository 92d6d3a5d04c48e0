//! Durable local key/value cache for session state.
//!
//! The storefront keeps exactly one thing here: the logged-in identity, so
//! that the next process start can restore the session without a remote
//! call. Values are opaque strings; callers own the encoding.
//!
//! # Implementations
//!
//! - [`FileSessionCache`] - one `{key}.json` file per key in a directory,
//!   replaced atomically (write to a temp file, then rename)
//! - [`MemorySessionCache`] - a map behind a mutex, for tests

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur when reading or writing the session cache.
#[derive(Debug, Error)]
pub enum SessionCacheError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key contains characters that cannot be used in a file name.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Stored value could not be decoded. Recovered by discarding the entry.
    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Durable string key/value storage.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<String>, SessionCacheError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn store(&self, key: &str, value: &str) -> Result<(), SessionCacheError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), SessionCacheError>;
}

// =============================================================================
// File-backed cache
// =============================================================================

/// Session cache storing one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    dir: PathBuf,
}

impl FileSessionCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SessionCacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionCacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SessionCacheError {
    SessionCacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl SessionCache for FileSessionCache {
    #[instrument(skip(self))]
    async fn load(&self, key: &str) -> Result<Option<String>, SessionCacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(SessionCacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    #[instrument(skip(self, value))]
    async fn store(&self, key: &str, value: &str) -> Result<(), SessionCacheError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        // Readers never observe a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(path = %path.display(), "Session cache entry written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<(), SessionCacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

// =============================================================================
// In-memory cache
// =============================================================================

/// Session cache held in memory.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let cache = Self::new();
        cache
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        cache
    }

    /// Whether `key` currently has a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn load(&self, key: &str) -> Result<Option<String>, SessionCacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), SessionCacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionCacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path().join("session"));

        assert_eq!(cache.load("identity").await.unwrap(), None);

        cache.store("identity", r#"{"a":1}"#).await.unwrap();
        assert_eq!(
            cache.load("identity").await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(cache.dir().join("identity.json").exists());

        cache.store("identity", r#"{"a":2}"#).await.unwrap();
        assert_eq!(
            cache.load("identity").await.unwrap().as_deref(),
            Some(r#"{"a":2}"#)
        );
        assert!(!cache.dir().join("identity.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_cache_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path());

        cache.store("identity", "x").await.unwrap();
        cache.remove("identity").await.unwrap();
        cache.remove("identity").await.unwrap();
        assert_eq!(cache.load("identity").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_cache_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path());

        for key in ["", "../escape", "a/b", "a.b"] {
            assert!(matches!(
                cache.store(key, "x").await,
                Err(SessionCacheError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_file_cache_read_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path());
        // A directory where the file should be
        std::fs::create_dir(dir.path().join("identity.json")).unwrap();

        assert!(matches!(
            cache.load("identity").await,
            Err(SessionCacheError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_cache_non_utf8_entry_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path());
        std::fs::write(dir.path().join("identity.json"), [0xff, 0xfe, 0x7b]).unwrap();

        assert!(matches!(
            cache.load("identity").await,
            Err(SessionCacheError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let cache = MemorySessionCache::with_entry("identity", "x");
        assert!(cache.contains("identity"));
        assert_eq!(cache.load("identity").await.unwrap().as_deref(), Some("x"));

        cache.remove("identity").await.unwrap();
        assert!(!cache.contains("identity"));
    }
}
