//! In-process store backed by a locked map.

use std::sync::RwLock;

use async_trait::async_trait;
use setthings_schema::FlatMap;
use tracing::trace;

use crate::StoreResult;
use crate::store::{SettingsStore, apply_write};

/// Volatile store keeping the namespace in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<FlatMap>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `entries`.
    #[must_use]
    pub fn with_entries(entries: FlatMap) -> Self {
        Self {
            inner: RwLock::new(entries),
        }
    }

    /// Returns a copy of the current contents.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> FlatMap {
        self.inner.read().expect("memory store poisoned").clone()
    }

    /// Returns the number of stored keys.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("memory store poisoned").len()
    }

    /// Returns `true` when the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    fn read_all(&self) -> StoreResult<FlatMap> {
        Ok(self.snapshot())
    }

    async fn read_all_async(&self) -> StoreResult<FlatMap> {
        self.read_all()
    }

    fn write_all(&self, updates: &FlatMap, merge: bool) -> StoreResult<()> {
        let mut guard = self.inner.write().expect("memory store poisoned");
        apply_write(&mut guard, updates, merge);
        trace!(keys = updates.len(), merge, "memory store write");
        Ok(())
    }

    async fn write_all_async(&self, updates: &FlatMap, merge: bool) -> StoreResult<()> {
        self.write_all(updates, merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn merge_write_keeps_other_keys() {
        let store = MemoryStore::with_entries(map(&[("A", "0"), ("B", "2")]));
        store.write_all(&map(&[("A", "1")]), true).unwrap();
        assert_eq!(store.read_all().unwrap(), map(&[("A", "1"), ("B", "2")]));
    }

    #[tokio::test]
    async fn replace_write_clears_namespace() {
        let store = MemoryStore::with_entries(map(&[("A", "0"), ("B", "2")]));
        store
            .write_all_async(&map(&[("C", "3")]), false)
            .await
            .unwrap();
        assert_eq!(store.read_all_async().await.unwrap(), map(&[("C", "3")]));
        assert_eq!(store.len(), 1);
    }
}
