//! Key vault for QMC files that carry no local key.
//!
//! Files with a `cex\0` footer reference a key held by the platform client;
//! the vault is loaded once at startup from an exported JSON map of
//! `media_file_name -> base64 ekey` and consulted during `validate`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock};

use crate::error::{DecoderError, DecoderResult};

static VAULT: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn vault() -> &'static RwLock<HashMap<String, String>> {
    VAULT.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Load vault entries from `path`. Returns the number of entries loaded.
pub fn load(path: &Path) -> DecoderResult<usize> {
    let content = std::fs::read_to_string(path)?;
    let entries: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
        DecoderError::key_unavailable("qmc", format!("vault parse failed: {}", e))
    })?;
    let count = entries.len();
    let mut guard = vault().write().unwrap();
    guard.extend(entries);
    tracing::debug!(count, source = %path.display(), "qmc vault loaded");
    Ok(count)
}

/// Insert a single entry; used by tests and by callers that resolve keys
/// out of band.
pub fn insert(media_file_name: &str, ekey: &str) {
    let mut guard = vault().write().unwrap();
    guard.insert(media_file_name.to_string(), ekey.to_string());
}

/// Base64 ekey for `media_file_name`, if the vault holds one.
pub fn lookup(media_file_name: &str) -> Option<String> {
    let guard = vault().read().unwrap();
    guard.get(media_file_name).cloned()
}
