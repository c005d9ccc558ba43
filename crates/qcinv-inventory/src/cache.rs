//! On-disk inventory cache
//!
//! The cache is a single JSON file. Its freshness is judged from the file's
//! modification time; the payload carries no timestamp.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::config::CacheConfig;
use crate::error::InventoryError;
use crate::types::{InventoryIndex, to_sorted_json};

/// Whether a cache written at `modified` is still usable at `now`
///
/// True iff `modified + max_age > now`. An expiry beyond the representable
/// range is in the future for a positive `max_age` and in the past otherwise.
#[must_use]
pub fn is_fresh(modified: DateTime<Utc>, max_age: TimeDelta, now: DateTime<Utc>) -> bool {
    match modified.checked_add_signed(max_age) {
        Some(expires) => expires > now,
        None => max_age > TimeDelta::zero(),
    }
}

/// Cache manager for the serialized inventory
#[derive(Debug, Clone)]
pub struct CacheManager {
    path: PathBuf,
    max_age: TimeDelta,
    disabled: bool,
}

impl CacheManager {
    /// Create a cache manager, creating the cache directory if needed
    ///
    /// # Errors
    /// Returns `CacheIo` if the cache directory cannot be created.
    pub fn new(config: &CacheConfig) -> Result<Self, InventoryError> {
        let path = config.path.clone();

        let dir = cache_dir(&path);
        fs::create_dir_all(dir).map_err(|source| InventoryError::CacheIo {
            path: dir.to_path_buf(),
            source,
        })?;

        let max_age = TimeDelta::try_seconds(config.max_age).unwrap_or(if config.max_age < 0 {
            TimeDelta::MIN
        } else {
            TimeDelta::MAX
        });

        Ok(Self {
            path,
            max_age,
            disabled: config.cache_disable,
        })
    }

    /// Location of the cache artifact
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether caching is switched off in configuration
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether the cache can be used instead of rebuilding
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// [`Self::is_valid`] evaluated at `now`
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.disabled {
            return false;
        }
        if !self.path.is_file() {
            debug!(path = %self.path.display(), "no cache file");
            return false;
        }

        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read cache mtime");
                return false;
            }
        };

        let fresh = is_fresh(modified, self.max_age, now);
        debug!(
            path = %self.path.display(),
            modified = %modified,
            max_age_secs = self.max_age.num_seconds(),
            fresh,
            "checked cache"
        );
        fresh
    }

    /// Read the cached inventory
    ///
    /// # Errors
    /// Returns `CacheIo` if the file cannot be read and `CacheParse` if it is
    /// not a JSON object. The document is returned as stored.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<InventoryIndex, InventoryError> {
        let text = fs::read_to_string(&self.path).map_err(|source| InventoryError::CacheIo {
            path: self.path.clone(),
            source,
        })?;

        let index: InventoryIndex =
            serde_json::from_str(&text).map_err(|source| InventoryError::CacheParse {
                path: self.path.clone(),
                source,
            })?;

        info!(hosts = index.host_count(), "loaded inventory from cache");
        Ok(index)
    }

    /// Replace the cached inventory
    ///
    /// The new content is written to a temporary file next to the artifact
    /// and renamed over it.
    ///
    /// # Errors
    /// Returns `CacheParse` if the index cannot be serialized and `CacheIo` if
    /// writing or renaming fails.
    #[instrument(skip(self, index), fields(path = %self.path.display()))]
    pub fn store(&self, index: &InventoryIndex) -> Result<(), InventoryError> {
        let json = to_sorted_json(index).map_err(|source| InventoryError::CacheParse {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| InventoryError::CacheIo {
            path: self.path.clone(),
            source,
        };

        let mut file = NamedTempFile::new_in(cache_dir(&self.path)).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(&self.path).map_err(|e| io_err(e.error))?;

        info!(hosts = index.host_count(), bytes = json.len(), "stored inventory cache");
        Ok(())
    }
}

/// Directory holding the cache file; a bare file name lives in `.`
fn cache_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}
