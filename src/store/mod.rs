//! Key-value state store contract consumed by the chaincode.
//!
//! The host ledger owns the real store; [`MemoryStore`] and [`FileStore`]
//! stand in for it in tests and in the command line host.

use std::collections::BTreeMap;

use thiserror::Error;

mod file;

pub use file::FileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open state file {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("failed to get state for {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("failed to put state for {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("failed to delete state for {key}: {reason}")]
    Delete { key: String, reason: String },

    #[error("record at {key} is not a valid account: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode account {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Get / put / delete on opaque byte values.
///
/// Calls are blocking and issued one at a time by a single invocation.
pub trait StateStore {
    /// `Ok(None)` when nothing is stored under `key`.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    /// Writes several records as one logical write.
    ///
    /// The default issues the puts in order and is not atomic: if a later put
    /// fails, the earlier ones stay applied. Stores that can commit all writes
    /// at once override this.
    fn put_batch(&mut self, writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        for (key, value) in writes {
            self.put(&key, value)?;
        }
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for &mut S {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn put_batch(&mut self, writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        (**self).put_batch(writes)
    }
}

/// In-memory store. Batches are applied atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl StateStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn put_batch(&mut self, writes: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        self.entries.extend(writes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store whose default `put_batch` fails on the second put.
    struct SecondPutFails {
        inner: MemoryStore,
        puts: usize,
    }

    impl StateStore for SecondPutFails {
        fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
            self.puts += 1;
            if self.puts == 2 {
                return Err(StoreError::Write {
                    key: key.to_string(),
                    reason: "injected".into(),
                });
            }
            self.inner.put(key, value)
        }

        fn delete(&mut self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key)
        }
    }

    #[test]
    fn memory_store_get_put_delete() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.put("a", b"1".to_vec()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"1".to_vec()));
        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn deleting_absent_key_is_not_an_error() {
        let mut store = MemoryStore::new();
        store.delete("ghost").unwrap();
    }

    #[test]
    fn default_batch_is_sequential_and_leaves_earlier_writes() {
        let mut store = SecondPutFails {
            inner: MemoryStore::new(),
            puts: 0,
        };
        let err = store
            .put_batch(vec![
                ("emp".into(), b"1".to_vec()),
                ("cpo".into(), b"2".to_vec()),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { ref key, .. } if key == "cpo"));
        assert_eq!(store.inner.get("emp").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.inner.get("cpo").unwrap(), None);
    }

    #[test]
    fn borrowed_store_forwards_calls() {
        fn write_pair<S: StateStore>(mut store: S) {
            store
                .put_batch(vec![("a".into(), b"x".to_vec()), ("b".into(), b"y".to_vec())])
                .unwrap();
        }

        let mut store = MemoryStore::new();
        write_pair(&mut store);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
