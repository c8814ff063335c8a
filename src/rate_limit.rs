//! Fixed-window action counters on top of [`ExpiringStore`].
//!
//! A window opens on the first hit and closes `window` seconds later no
//! matter how many hits land inside it, so a burst straddling the boundary
//! can reach twice the nominal rate. That is accepted behaviour.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{clock::Clock, store::ExpiringStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub max:    u32,
    pub window: u64,
}

/// One room creation per 30s per origin.
pub const CREATE_THROTTLE: Throttle = Throttle { max: 1, window: 30 };
/// Five messages per 10s per origin.
pub const SEND_THROTTLE: Throttle = Throttle { max: 5, window: 10 };
/// At most ten rooms per origin per day.
pub const ROOM_CAP: Throttle = Throttle { max: 10, window: 86_400 };

#[derive(Debug, Clone, Copy)]
pub struct Counter {
    hits:     u32,
    reset_at: i64,
}

pub struct RateLimiter {
    counters: ExpiringStore<Counter>,
    clock:    Arc<dyn Clock>,
    // serializes read-then-write on counters
    gate:     Mutex<()>,
}

impl RateLimiter {
    pub fn new(counters: ExpiringStore<Counter>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock, gate: Mutex::new(()) }
    }

    /// Counts one action for `key` and tells whether it is allowed.
    /// A denied call does not count.
    pub async fn allow(&self, key: &str, max: u32, window: u64) -> bool {
        let _gate = self.gate.lock().await;
        let now = self.clock.now();
        match self.counters.get(key).await {
            None => {
                self.open(key, now, window).await;
                true
            }
            Some(c) if c.hits >= max => false,
            Some(c) => {
                self.bump(key, c, now).await;
                true
            }
        }
    }

    pub async fn allow_by(&self, key: &str, t: Throttle) -> bool {
        self.allow(key, t.max, t.window).await
    }

    /// Hits recorded for `key` in the current window.
    pub async fn count(&self, key: &str) -> u32 {
        self.counters.get(key).await.map_or(0, |c| c.hits)
    }

    /// Whether `key` is still below `max` without recording anything.
    pub async fn within(&self, key: &str, max: u32) -> bool {
        self.count(key).await < max
    }

    /// Unconditionally records one hit, opening a window if none is live.
    pub async fn record(&self, key: &str, window: u64) -> u32 {
        let _gate = self.gate.lock().await;
        let now = self.clock.now();
        match self.counters.get(key).await {
            None => self.open(key, now, window).await,
            Some(c) => self.bump(key, c, now).await,
        }
    }

    pub async fn sweep(&self) -> usize {
        self.counters.sweep().await
    }

    async fn open(&self, key: &str, now: i64, window: u64) -> u32 {
        let c = Counter { hits: 1, reset_at: now + window as i64 };
        self.counters.put(key, c, window).await;
        c.hits
    }

    // re-put with the remaining lifetime so the window stays fixed
    async fn bump(&self, key: &str, c: Counter, now: i64) -> u32 {
        let hits = c.hits + 1;
        let left = (c.reset_at - now).max(0) as u64;
        self.counters.put(key, Counter { hits, ..c }, left).await;
        hits
    }
}
