//! Mutex guarded get-or-load map shared by the per-file managers.
//!
//! All locking happens here: loaders and updaters run while the lock is held,
//! so the map and the disk state they touch change together.

use anyhow::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct KeyedCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Returns the memoized value, or runs `load` and memoizes what it
    /// produces. `Ok(None)` from the loader is not memoized, so a later call
    /// tries again.
    pub fn get_or_try_load<F>(&self, key: &K, load: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Result<Option<V>>,
    {
        let mut entries = self.lock();
        if let Some(v) = entries.get(key) {
            return Ok(Some(v.clone()));
        }
        let loaded = load()?;
        if let Some(v) = &loaded {
            entries.insert(key.clone(), v.clone());
        }
        Ok(loaded)
    }

    /// 基于当前值计算新值并保存；`update` 失败时不做任何修改
    pub fn try_update<F>(&self, key: &K, update: F) -> Result<V>
    where
        F: FnOnce(Option<&V>) -> Result<V>,
    {
        let mut entries = self.lock();
        let value = update(entries.get(key))?;
        entries.insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;

    #[test]
    fn test_loader_runs_once() {
        let cache: KeyedCache<String, u32> = KeyedCache::new();
        let calls = Cell::new(0);
        let key = "a".to_string();

        for _ in 0..3 {
            let v = cache
                .get_or_try_load(&key, || {
                    calls.set(calls.get() + 1);
                    Ok(Some(7))
                })
                .unwrap();
            assert_eq!(v, Some(7));
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_absent_is_not_memoized() {
        let cache: KeyedCache<String, u32> = KeyedCache::new();
        let key = "a".to_string();

        assert_eq!(cache.get_or_try_load(&key, || Ok(None)).unwrap(), None);
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_try_load(&key, || Ok(Some(1))).unwrap(), Some(1));
    }

    #[test]
    fn test_failed_update_keeps_old_value() {
        let cache: KeyedCache<String, u32> = KeyedCache::new();
        let key = "a".to_string();
        cache.try_update(&key, |_| Ok(1)).unwrap();

        let err = cache.try_update(&key, |_| Err(anyhow!("disk full")));
        assert!(err.is_err());
        assert_eq!(cache.get(&key), Some(1));

        let v = cache.try_update(&key, |old| Ok(old.copied().unwrap_or(0) + 1)).unwrap();
        assert_eq!(v, 2);
    }
}
