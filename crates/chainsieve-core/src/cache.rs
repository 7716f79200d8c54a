//! Process-lifetime caches shared by processors.
//!
//! All caches are read-mostly and populate on first use. Concurrent
//! population of the same key is harmless: inputs are immutable per key, so
//! the first value written wins and later builders are discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::SieveError;

/// Parsed interfaces keyed by logical ABI name.
///
/// Callers must not register two different documents under the same name.
#[derive(Debug)]
pub struct InterfaceCache<T> {
    inner: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Default for InterfaceCache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> InterfaceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Return the cached interface, building it with `build` on a miss.
    ///
    /// The builder runs outside the lock; a build error is returned and
    /// nothing is cached.
    pub fn get_or_try_insert<F>(&self, name: &str, build: F) -> Result<Arc<T>, SieveError>
    where
        F: FnOnce() -> Result<T, SieveError>,
    {
        if let Some(hit) = self.get(name) {
            return Ok(hit);
        }

        let built = Arc::new(build()?);
        let mut map = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(map.entry(name.to_string()).or_insert(built).clone())
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Memo of resolved lookups keyed by `(abi name, label)`. Only hits are
/// stored, so a label added to a later ABI revision is not shadowed.
#[derive(Debug)]
pub struct LabelMemo<V> {
    inner: RwLock<HashMap<(String, String), V>>,
}

impl<V> Default for LabelMemo<V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> LabelMemo<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve<F>(&self, abi: &str, label: &str, resolve: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        let key = (abi.to_string(), label.to_string());
        if let Some(hit) = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return Some(hit.clone());
        }

        let value = resolve()?;
        let mut map = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(map.entry(key).or_insert(value).clone())
    }
}

/// Holds only the most recently decoded value.
///
/// A filter pass followed by a transform pass over the same record decodes
/// once; a different key evicts the previous entry. Failed decodes are
/// remembered too so the second pass does not retry them.
#[derive(Debug)]
pub struct SingleSlot<K, V> {
    slot: Mutex<Option<(K, Option<Arc<V>>)>>,
}

impl<K, V> Default for SingleSlot<K, V> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<K: PartialEq + Clone, V> SingleSlot<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with<F>(&self, key: &K, decode: F) -> Option<Arc<V>>
    where
        F: FnOnce() -> Option<V>,
    {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((cached_key, value)) = slot.as_ref() {
            if cached_key == key {
                return value.clone();
            }
        }

        let value = decode().map(Arc::new);
        *slot = Some((key.clone(), value.clone()));
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn interface_cache_first_writer_wins() {
        let cache: InterfaceCache<String> = InterfaceCache::new();
        let a = cache.get_or_try_insert("erc20", || Ok("first".into())).unwrap();
        let b = cache.get_or_try_insert("erc20", || Ok("second".into())).unwrap();
        assert_eq!(*a, "first");
        assert_eq!(*b, "first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn interface_cache_does_not_store_failures() {
        let cache: InterfaceCache<String> = InterfaceCache::new();
        let err = cache.get_or_try_insert("bad", || {
            Err(SieveError::InvalidAbi {
                name: "bad".into(),
                reason: "nope".into(),
            })
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn label_memo_caches_hits_only() {
        let memo: LabelMemo<usize> = LabelMemo::new();
        let calls = Cell::new(0);
        let resolve = || {
            calls.set(calls.get() + 1);
            Some(1)
        };
        assert_eq!(memo.get_or_resolve("erc20", "Approval", resolve), Some(1));
        assert_eq!(memo.get_or_resolve("erc20", "Approval", || None), Some(1));
        assert_eq!(calls.get(), 1);

        assert_eq!(memo.get_or_resolve("erc20", "Removal", || None), None);
        assert_eq!(memo.get_or_resolve("erc20", "Removal", || Some(7)), Some(7));
    }

    #[test]
    fn single_slot_decodes_once_per_key() {
        let slot: SingleSlot<Vec<u8>, String> = SingleSlot::new();
        let calls = Cell::new(0);
        let decode = |s: &str| {
            calls.set(calls.get() + 1);
            Some(s.to_string())
        };

        let key = vec![1u8, 2];
        assert_eq!(slot.get_or_insert_with(&key, || decode("a")).as_deref().map(String::as_str), Some("a"));
        assert_eq!(slot.get_or_insert_with(&key, || decode("b")).as_deref().map(String::as_str), Some("a"));
        assert_eq!(calls.get(), 1);

        let other = vec![3u8];
        assert_eq!(slot.get_or_insert_with(&other, || decode("c")).as_deref().map(String::as_str), Some("c"));
        assert_eq!(slot.get_or_insert_with(&key, || decode("d")).as_deref().map(String::as_str), Some("d"));
        assert_eq!(calls.get(), 3);
    }
}
