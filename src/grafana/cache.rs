//! Read-through cache with a fixed time-to-live.

use std::future::Future;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;

use crate::time::{Clock, SystemClock};

struct Entry<T> {
    value: T,
    stored_at: SystemTime,
}

/// Holds one value for a fixed TTL, refilling it on demand.
///
/// There is no invalidation besides expiry. Callers own the cache and pass
/// it to whatever needs it. Concurrent callers serialize on an async mutex,
/// so a refill runs at most once at a time.
///
/// # Example
///
/// ```
/// use grafana_ask::grafana::TtlCache;
/// use std::time::Duration;
///
/// # async fn example() {
/// let cache = TtlCache::new(Duration::from_secs(300));
/// let value: Result<u32, ()> = cache.get_or_refresh(|| async { Ok(7) }).await;
/// assert_eq!(value, Ok(7));
/// # }
/// ```
pub struct TtlCache<T, C = SystemClock> {
    ttl: Duration,
    clock: C,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T> TtlCache<T, SystemClock> {
    /// Creates an empty cache using the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            clock: SystemClock,
            slot: Mutex::new(None),
        }
    }
}

impl<T, C> TtlCache<T, C> {
    /// Replaces the clock.
    #[must_use]
    pub fn with_clock<C2>(self, clock: C2) -> TtlCache<T, C2> {
        TtlCache {
            ttl: self.ttl,
            clock,
            slot: self.slot,
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<T: Clone, C: Clock> TtlCache<T, C> {
    /// Returns the cached value while fresh, otherwise calls `refill` and
    /// stores its result.
    ///
    /// # Errors
    ///
    /// Returns the refill error unchanged; the cache is left empty.
    pub async fn get_or_refresh<F, Fut, E>(&self, refill: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();

        if let Some(entry) = slot.as_ref() {
            if self.is_fresh(entry.stored_at, now) {
                return Ok(entry.value.clone());
            }
        }

        *slot = None;
        let value = refill().await?;
        *slot = Some(Entry {
            value: value.clone(),
            stored_at: self.clock.now(),
        });
        Ok(value)
    }

    /// Returns the cached value if it is still fresh.
    pub async fn peek(&self) -> Option<T> {
        let slot = self.slot.lock().await;
        let now = self.clock.now();
        slot.as_ref()
            .filter(|entry| self.is_fresh(entry.stored_at, now))
            .map(|entry| entry.value.clone())
    }

    /// A clock that moved backwards counts as expired.
    fn is_fresh(&self, stored_at: SystemTime, now: SystemTime) -> bool {
        now.duration_since(stored_at)
            .is_ok_and(|age| age < self.ttl)
    }
}

impl<T, C> std::fmt::Debug for TtlCache<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
