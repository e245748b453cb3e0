use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::Path,
};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::AppError, resolver::Reason};

/// Cache document format version
const CACHE_VERSION: u32 = 1;

/// Last resolution for one `owner/repo`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub profile: String,
    pub reason: Reason,
    pub resolved_at: DateTime<Utc>,
    /// Config fingerprint at the time of resolution
    pub config_hash: String,
}

impl CacheEntry {
    /// Entry stamped with the current time
    pub fn now(profile: &str, reason: Reason, config_hash: &str) -> Self {
        Self {
            profile: profile.to_string(),
            reason,
            resolved_at: Utc::now(),
            config_hash: config_hash.to_string(),
        }
    }
}

/// Persisted `owner/repo` → profile memo
///
/// The file is read and written as a whole. There is no locking, so two
/// concurrent `ctx` runs may race and the last writer wins.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolutionCache {
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the cache file, falling back to an empty cache on any failure
    ///
    /// The cache is advisory, so a missing, unreadable or corrupt file never
    /// stops a resolution.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache file, starting empty");
                return Self::new();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read cache, starting empty");
                return Self::new();
            }
        };

        if contents.trim().is_empty() {
            return Self::new();
        }

        match serde_json::from_str::<ResolutionCache>(&contents) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            Ok(cache) => {
                warn!(path = %path.display(), version = cache.version, "unsupported cache version, starting empty");
                Self::new()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt cache file, starting empty");
                Self::new()
            }
        }
    }

    /// Writes the whole cache atomically with owner-only permissions
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        create_private_dir(dir)?;

        let json: String = serde_json::to_string_pretty(self)?;
        // NamedTempFile is created 0600 on unix; rename keeps readers from
        // ever seeing a half-written document.
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|err| AppError::Io(err.error))?;
        debug!(path = %path.display(), entries = self.entries.len(), "saved cache");
        Ok(())
    }

    /// Returns the entry for `key` when it is fresh and matches `config_hash`
    pub fn lookup(&self, key: &str, config_hash: &str, ttl_days: u32) -> Option<&CacheEntry> {
        self.lookup_at(key, config_hash, ttl_days, Utc::now())
    }

    /// Same as [`lookup`](Self::lookup) with an explicit clock
    pub fn lookup_at(
        &self,
        key: &str,
        config_hash: &str,
        ttl_days: u32,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        let entry = self.entries.get(key)?;
        if entry.config_hash != config_hash {
            debug!(key, "cache entry from a different config");
            return None;
        }
        if now - entry.resolved_at > Duration::days(i64::from(ttl_days)) {
            debug!(key, ttl_days, "cache entry expired");
            return None;
        }
        Some(entry)
    }

    /// Inserts or replaces the entry for `key`
    pub fn set(&mut self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    /// Removes every entry resolved to `profile`, returning how many were dropped
    pub fn invalidate_by_profile(&mut self, profile: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.profile != profile);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.exists() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir)?;
    Ok(())
}
