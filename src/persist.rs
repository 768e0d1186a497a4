//! Persistence boundary for created instances
//!
//! The factory system treats persistence as an opaque capability: it hands a
//! serialized row to a [`Persister`] and gets the primary key back. The
//! bundled [`MemoryPersister`] keeps rows in process, which is enough for
//! tests and local seeding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::attributes::ResolvedMap;
use crate::error::FactoryResult;

/// Connection identifier used when a builder sets no override
pub const DEFAULT_CONNECTION: &str = "default";

/// Storage backend for created instances
#[async_trait::async_trait]
pub trait Persister: Send + Sync {
    /// Insert a row and return its primary key value
    ///
    /// `connection` carries a builder's connection override, `None` meaning
    /// the backend's default target. Backends assign a key when the row has
    /// none under `key_column`.
    async fn insert(
        &self,
        table: &str,
        key_column: &str,
        connection: Option<&str>,
        row: &ResolvedMap,
    ) -> FactoryResult<Value>;
}

/// In-process persister with per-(connection, table) row stores
#[derive(Debug)]
pub struct MemoryPersister {
    tables: Mutex<HashMap<(String, String), Vec<ResolvedMap>>>,
    next_key: AtomicI64,
}

impl Default for MemoryPersister {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            next_key: AtomicI64::new(1),
        }
    }

    /// Rows inserted into a table on the default connection
    ///
    /// # Panics
    /// Panics if the row store lock is poisoned.
    pub fn rows(&self, table: &str) -> Vec<ResolvedMap> {
        self.rows_on(DEFAULT_CONNECTION, table)
    }

    /// Rows inserted into a table on a named connection
    ///
    /// # Panics
    /// Panics if the row store lock is poisoned.
    pub fn rows_on(&self, connection: &str, table: &str) -> Vec<ResolvedMap> {
        self.tables
            .lock()
            .unwrap()
            .get(&(connection.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }
}

#[async_trait::async_trait]
impl Persister for MemoryPersister {
    async fn insert(
        &self,
        table: &str,
        key_column: &str,
        connection: Option<&str>,
        row: &ResolvedMap,
    ) -> FactoryResult<Value> {
        let mut row = row.clone();
        let key = match row.get(key_column) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                let key = Value::from(self.next_key.fetch_add(1, Ordering::SeqCst));
                row.insert(key_column.to_string(), key.clone());
                key
            }
        };

        let connection = connection.unwrap_or(DEFAULT_CONNECTION);
        tracing::debug!(table, connection, "inserting factory row");

        self.tables
            .lock()
            .unwrap()
            .entry((connection.to_string(), table.to_string()))
            .or_default()
            .push(row);

        Ok(key)
    }
}
