//! Read-mostly metadata cache keyed by path, size and mtime, so repeated
//! runs over the same library skip the header walk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};
use std::time::{Duration, Instant, SystemTime};

use decoder::AudioMeta;

const CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const CACHE_CAPACITY: usize = 1000;

/// Owned snapshot of a metadata record.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredMeta {
    pub title: String,
    pub album: String,
    pub artists: Vec<String>,
}

impl StoredMeta {
    pub fn capture(meta: &dyn AudioMeta) -> Self {
        Self {
            title: meta.title(),
            album: meta.album(),
            artists: meta.artists(),
        }
    }
}

impl AudioMeta for StoredMeta {
    fn title(&self) -> String {
        self.title.clone()
    }
    fn album(&self) -> String {
        self.album.clone()
    }
    fn artists(&self) -> Vec<String> {
        self.artists.clone()
    }
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct CacheKey {
    path: PathBuf,
    size: u64,
    mtime: SystemTime,
}

struct CacheEntry {
    meta: StoredMeta,
    stored_at: Instant,
}

static CACHE: OnceLock<RwLock<HashMap<CacheKey, CacheEntry>>> = OnceLock::new();

fn cache() -> &'static RwLock<HashMap<CacheKey, CacheEntry>> {
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn key_for(path: &Path) -> Option<CacheKey> {
    let stat = std::fs::metadata(path).ok()?;
    Some(CacheKey {
        path: path.to_path_buf(),
        size: stat.len(),
        mtime: stat.modified().ok()?,
    })
}

pub fn get(path: &Path) -> Option<StoredMeta> {
    let key = key_for(path)?;
    let guard = cache().read().unwrap();
    let entry = guard.get(&key)?;
    if entry.stored_at.elapsed() > CACHE_TTL {
        return None;
    }
    Some(entry.meta.clone())
}

pub fn put(path: &Path, meta: &dyn AudioMeta) {
    let Some(key) = key_for(path) else {
        return;
    };
    let mut guard = cache().write().unwrap();
    if guard.len() >= CACHE_CAPACITY {
        guard.retain(|_, entry| entry.stored_at.elapsed() <= CACHE_TTL);
        if guard.len() >= CACHE_CAPACITY {
            guard.clear();
        }
    }
    guard.insert(
        key,
        CacheEntry {
            meta: StoredMeta::capture(meta),
            stored_at: Instant::now(),
        },
    );
}
