//! On-disk cache for search API responses.
//!
//! One JSON file per normalized query under a cache directory. Entries are
//! immutable once written and trusted indefinitely — there is no expiry or
//! eviction; clearing the directory is the only invalidation.
//!
//! The cache is an explicit dependency injected into the search client
//! (via [`CacheStore`]) so tests can substitute [`MemoryCache`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use mspscout_shared::{CacheEntry, MspScoutError, Result};

/// Maximum length of the human-readable portion of a cache key.
const KEY_MAX_LEN: usize = 120;

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a deterministic, filesystem-safe cache key from a query string.
///
/// Runs of non-alphanumeric characters collapse to `-` and the result is
/// capped at [`KEY_MAX_LEN`] chars; an 8-hex-char SHA-256 suffix keeps
/// truncated keys collision-free. Repeated runs always hit the same entry.
pub fn cache_key(query: &str) -> String {
    let mut sanitized = String::with_capacity(query.len().min(KEY_MAX_LEN));
    let mut last_dash = false;
    for c in query.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c);
            last_dash = false;
        } else if !last_dash {
            sanitized.push('-');
            last_dash = true;
        }
        if sanitized.len() >= KEY_MAX_LEN {
            break;
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("{}-{}", sanitized.trim_matches('-'), &digest[..8])
}

// ---------------------------------------------------------------------------
// CacheStore trait
// ---------------------------------------------------------------------------

/// Key→value store for search responses.
///
/// `get` returns `Ok(None)` on a plain miss and `Err(CacheRead)` when an
/// entry exists but cannot be read; callers treat both as a miss. `put` is
/// idempotent — storing identical content under an existing key is a no-op.
pub trait CacheStore: Send + Sync {
    /// Look up an entry by key.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry under `key`.
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FsCache
// ---------------------------------------------------------------------------

/// Filesystem-backed cache: `<dir>/<key>.json` per entry.
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    /// Create a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| MspScoutError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// The cache directory root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CacheStore for FsCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| MspScoutError::CacheRead(format!("{}: {e}", path.display())))?;

        let entry: CacheEntry = serde_json::from_str(&content)
            .map_err(|e| MspScoutError::CacheRead(format!("{}: {e}", path.display())))?;

        debug!(key, hits = entry.hits.len(), "cache hit");
        Ok(Some(entry))
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(key);
        let content = serde_json::to_string(entry)
            .map_err(|e| MspScoutError::validation(format!("cache entry serialize: {e}")))?;

        // Identical content under an existing key is a no-op.
        if let Ok(existing) = std::fs::read_to_string(&path) {
            if existing == content {
                debug!(key, "cache entry unchanged, skipping write");
                return Ok(());
            }
            warn!(key, "overwriting cache entry with new content");
        }

        // Stage in the cache dir and rename into place, so a reader never
        // sees a half-written entry and an interrupted write leaves the old
        // entry intact.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, content).map_err(|e| MspScoutError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| MspScoutError::io(&path, e))?;
        debug!(key, "cache entry written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// In-memory cache for tests and dry runs.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.lock().expect("cache lock").get(key).cloned())
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        self.entries
            .lock()
            .expect("cache lock")
            .insert(key.to_string(), entry.clone());
        Ok(())
    }
}
