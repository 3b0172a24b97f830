use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::domain::StoreError;
use crate::ports::KeyValueStore;

/// In-memory key-value store.
///
/// Used by tests and by nodes configured without durable storage. Keys are
/// kept ordered so prefix scans return entries in key order, like RocksDB.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let results = self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_kv_store() {
        let store = InMemoryKeyValueStore::new();

        store.put(b"key1", b"value1").unwrap();
        store.put(b"key2", b"value2").unwrap();

        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"key2").unwrap(), Some(b"value2".to_vec()));
        assert_eq!(store.get(b"key3").unwrap(), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_put_overwrites_and_delete_is_idempotent() {
        let store = InMemoryKeyValueStore::new();
        store.put(b"k", b"old").unwrap();
        store.put(b"k", b"new").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));

        store.delete(b"k").unwrap();
        store.delete(b"k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_prefix_scan() {
        let store = InMemoryKeyValueStore::new();

        store.put(b"node:2", b"b").unwrap();
        store.put(b"node:1", b"a").unwrap();
        store.put(b"meta:1", b"m").unwrap();

        let nodes = store.prefix_scan(b"node:").unwrap();
        assert_eq!(
            nodes,
            vec![
                (b"node:1".to_vec(), b"a".to_vec()),
                (b"node:2".to_vec(), b"b".to_vec())
            ]
        );
        assert_eq!(store.prefix_scan(b"").unwrap().len(), 3);
        assert!(store.prefix_scan(b"zzz").unwrap().is_empty());
    }
}
