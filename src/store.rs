//! Process-wide key/value store whose entries vanish after a time-to-live.
//!
//! Expiry is lazy on `get` and eager through [`ExpiringStore::sweep`], which the
//! background cleaner calls periodically. A TTL only ever comes from the most
//! recent `put`; there is no way to extend it short of storing the value again.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Entry<V> {
    value:      V,
    expires_at: i64,
}

impl<V> Entry<V> {
    fn live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// Cheap to clone; every clone shares the same map.
pub struct ExpiringStore<V> {
    map:   Arc<RwLock<HashMap<String, Entry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Clone for ExpiringStore<V> {
    fn clone(&self) -> Self {
        Self { map: self.map.clone(), clock: self.clock.clone() }
    }
}

impl<V: Clone + Send + Sync> ExpiringStore<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { map: Arc::default(), clock }
    }

    /// Stores `value` under `key`, replacing any previous entry and its TTL.
    pub async fn put(&self, key: &str, value: V, ttl_secs: u64) {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires_at = self.clock.now().saturating_add(ttl);
        self.map
            .write()
            .await
            .insert(key.to_owned(), Entry { value, expires_at });
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let map = self.map.read().await;
            match map.get(key) {
                None => return None,
                Some(e) if e.live(now) => return Some(e.value.clone()),
                Some(_) => {}
            }
        }
        // expired: drop it, unless someone re-put it in between
        let mut map = self.map.write().await;
        if map.get(key).is_some_and(|e| !e.live(now)) {
            map.remove(key);
        }
        None
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.map.write().await.remove(key).is_some()
    }

    /// Purges every expired entry and returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.map.write().await;
        let before = map.len();
        map.retain(|_, e| e.live(now));
        before - map.len()
    }

    /// Number of entries held, expired-but-unswept ones included.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
