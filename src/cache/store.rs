//! Cache store trait and in-memory implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::http::Response;

/// A cached response together with its storage timestamp.
#[derive(Debug, Clone)]
pub struct StoredResponse {
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Trait for named cache stores holding URL-keyed responses.
///
/// A store groups entries into named caches (one generation each). Entries
/// are last-write-wins: a `put` for an existing URL replaces the previous
/// entry. Entries never expire individually; a whole cache is deleted when
/// its generation goes stale.
pub trait CacheStore: Send + Sync {
  /// Create a named cache if it does not exist yet.
  fn open(&self, cache: &str) -> Result<()>;

  /// Store a response under `url`, creating the cache if needed.
  fn put(&self, cache: &str, url: &str, response: &Response) -> Result<()>;

  /// Look up a response in a single named cache.
  fn get(&self, cache: &str, url: &str) -> Result<Option<StoredResponse>>;

  /// All cache names currently present, in creation order.
  fn cache_names(&self) -> Result<Vec<String>>;

  /// Delete a whole cache and its entries. Returns whether it existed.
  fn delete_cache(&self, cache: &str) -> Result<bool>;

  /// Number of entries in a named cache (0 if absent).
  fn entry_count(&self, cache: &str) -> Result<usize>;

  /// First match for `url` across the given caches, in order.
  fn get_any(&self, caches: &[&str], url: &str) -> Result<Option<StoredResponse>> {
    for cache in caches {
      if let Some(hit) = self.get(cache, url)? {
        return Ok(Some(hit));
      }
    }
    Ok(None)
  }
}

/// In-memory store used by tests and `--ephemeral` runs.
pub struct MemoryStore {
  caches: Mutex<Vec<(String, BTreeMap<String, StoredResponse>)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      caches: Mutex::new(Vec::new()),
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheStore for MemoryStore {
  fn open(&self, cache: &str) -> Result<()> {
    let mut caches = self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if !caches.iter().any(|(name, _)| name == cache) {
      caches.push((cache.to_string(), BTreeMap::new()));
    }
    Ok(())
  }

  fn put(&self, cache: &str, url: &str, response: &Response) -> Result<()> {
    let mut caches = self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let idx = match caches.iter().position(|(name, _)| name == cache) {
      Some(i) => i,
      None => {
        caches.push((cache.to_string(), BTreeMap::new()));
        caches.len() - 1
      }
    };
    caches[idx].1.insert(
      url.to_string(),
      StoredResponse {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn get(&self, cache: &str, url: &str) -> Result<Option<StoredResponse>> {
    let caches = self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      caches
        .iter()
        .find(|(name, _)| name == cache)
        .and_then(|(_, entries)| entries.get(url))
        .cloned(),
    )
  }

  fn cache_names(&self) -> Result<Vec<String>> {
    let caches = self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(caches.iter().map(|(name, _)| name.clone()).collect())
  }

  fn delete_cache(&self, cache: &str) -> Result<bool> {
    let mut caches = self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let before = caches.len();
    caches.retain(|(name, _)| name != cache);
    Ok(caches.len() < before)
  }

  fn entry_count(&self, cache: &str) -> Result<usize> {
    let caches = self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      caches
        .iter()
        .find(|(name, _)| name == cache)
        .map(|(_, entries)| entries.len())
        .unwrap_or(0),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_is_idempotent() {
    let store = MemoryStore::new();
    store.open("shell-v1").unwrap();
    store.open("shell-v1").unwrap();
    assert_eq!(store.cache_names().unwrap(), vec!["shell-v1"]);
  }

  #[test]
  fn test_put_creates_cache_implicitly() {
    let store = MemoryStore::new();
    store
      .put("runtime-v1", "https://a/x.js", &Response::ok("https://a/x.js", "body"))
      .unwrap();
    assert_eq!(store.cache_names().unwrap(), vec!["runtime-v1"]);
    assert_eq!(store.entry_count("runtime-v1").unwrap(), 1);
  }

  #[test]
  fn test_put_overwrites_existing_entry() {
    let store = MemoryStore::new();
    let url = "https://a/manifest.json";
    store.put("shell-v1", url, &Response::ok(url, "old")).unwrap();
    store.put("shell-v1", url, &Response::ok(url, "new")).unwrap();
    assert_eq!(store.entry_count("shell-v1").unwrap(), 1);
    let hit = store.get("shell-v1", url).unwrap().unwrap();
    assert_eq!(hit.response.body, b"new");
  }

  #[test]
  fn test_get_any_checks_caches_in_order() {
    let store = MemoryStore::new();
    let url = "https://a/app.js";
    store.put("shell-v1", url, &Response::ok(url, "shell")).unwrap();
    store.put("runtime-v1", url, &Response::ok(url, "runtime")).unwrap();
    let hit = store.get_any(&["shell-v1", "runtime-v1"], url).unwrap().unwrap();
    assert_eq!(hit.response.body, b"shell");
  }

  #[test]
  fn test_delete_cache_removes_entries() {
    let store = MemoryStore::new();
    store
      .put("old-v1", "https://a/x", &Response::ok("https://a/x", ""))
      .unwrap();
    assert!(store.delete_cache("old-v1").unwrap());
    assert!(!store.delete_cache("old-v1").unwrap());
    assert!(store.get("old-v1", "https://a/x").unwrap().is_none());
    assert_eq!(store.entry_count("old-v1").unwrap(), 0);
  }
}
