//! Persistent key-value store used as the durability substrate.
//!
//! The queue and the menu cache each own exactly one key; nothing outside
//! those components reads or writes the raw store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::{self, DbState};
use crate::error::{OfflineError, Result};

/// Asynchronous string-keyed store with get/set semantics.
///
/// A single `set` must replace the previous value atomically: readers see
/// either the old value or the new one, never a mix.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed store. Survives process restarts when opened through
/// [`db::init`].
pub struct SqliteStore {
    db: Arc<DbState>,
}

impl SqliteStore {
    pub fn new(db: Arc<DbState>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self
            .db
            .conn
            .lock()
            .map_err(|e| OfflineError::Storage(format!("store lock: {e}")))?;
        db::kv_get(&conn, key).map_err(|e| OfflineError::Storage(format!("read {key}: {e}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self
            .db
            .conn
            .lock()
            .map_err(|e| OfflineError::Storage(format!("store lock: {e}")))?;
        db::kv_set(&conn, key, value)
            .map_err(|e| OfflineError::Storage(format!("write {key}: {e}")))
    }
}

/// Volatile store for tests and for embedders that handle durability
/// elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| OfflineError::Storage(format!("store lock: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| OfflineError::Storage(format!("store lock: {e}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let store = SqliteStore::new(Arc::new(db::open_in_memory().unwrap()));

        assert_eq!(store.get("OFFLINE_MENU_CACHE").await.unwrap(), None);
        store.set("OFFLINE_MENU_CACHE", "{}").await.unwrap();
        assert_eq!(
            store.get("OFFLINE_MENU_CACHE").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryStore::new();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.set("a", "3").await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }
}
