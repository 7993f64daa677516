// src/repositories/kv_store.rs
//
// Namespaced key-value backing store for the track cache.
//
// CRITICAL RULES:
// - Stores are DUMB data mappers
// - NO business logic
// - NO expiry or retention decisions (the cache owns those)

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rusqlite::params;

use crate::db::{get_connection, ConnectionPool};
use crate::error::{AppError, AppResult};

/// Key-value contract the cache persists through.
///
/// Single-key operations are atomic; no transactions are required.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn delete(&self, key: &str) -> AppResult<()>;

    /// Values aligned with `keys`; missing keys yield `None`
    fn get_many(&self, keys: &[String]) -> AppResult<Vec<Option<String>>>;
    fn delete_many(&self, keys: &[String]) -> AppResult<()>;

    /// Every stored key starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteKeyValueStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let conn = get_connection(&self.pool)?;

        match conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;

        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;

        Ok(())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;

        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;

        Ok(())
    }

    fn get_many(&self, keys: &[String]) -> AppResult<Vec<Option<String>>> {
        let conn = get_connection(&self.pool)?;

        let mut stmt = conn.prepare("SELECT value FROM kv_entries WHERE key = ?1")?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match stmt.query_row(params![key], |row| row.get(0)) {
                Ok(v) => Some(v),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(AppError::Database(e)),
            };
            values.push(value);
        }

        Ok(values)
    }

    fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        let conn = get_connection(&self.pool)?;

        let mut stmt = conn.prepare("DELETE FROM kv_entries WHERE key = ?1")?;
        for key in keys {
            stmt.execute(params![key])?;
        }

        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let conn = get_connection(&self.pool)?;

        let mut stmt =
            conn.prepare("SELECT key FROM kv_entries WHERE key LIKE ?1 || '%' ORDER BY key")?;

        let keys: Vec<String> = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION (tests, ephemeral sessions)
// ============================================================================

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn get_many(&self, keys: &[String]) -> AppResult<Vec<Option<String>>> {
        let entries = self.entries.read().unwrap();
        Ok(keys.iter().map(|k| entries.get(k).cloned()).collect())
    }

    fn delete_many(&self, keys: &[String]) -> AppResult<()> {
        let mut entries = self.entries.write().unwrap();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
