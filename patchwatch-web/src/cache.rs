use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Single-slot, time-bounded memo of an expensive value.
///
/// The whole check-recompute-store sequence runs under one lock: callers
/// arriving during a refresh wait for it and get the fresh value, so there is
/// at most one recompute per expiry window.
pub struct ReadCache<T> {
    ttl: Duration,
    slot: Mutex<Option<CacheSlot<T>>>,
}

struct CacheSlot<T> {
    value: Arc<T>,
    /// `None` when `now + ttl` is past what `Instant` can represent: never expires.
    expires_at: Option<Instant>,
}

impl<T> ReadCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: Mutex::new(None) }
    }

    pub fn get_or_refresh<F>(&self, compute: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        self.get_or_refresh_at(Instant::now(), compute)
    }

    /// Same as [`get_or_refresh`](Self::get_or_refresh) with an explicit clock reading.
    pub fn get_or_refresh_at<F>(&self, now: Instant, compute: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let mut slot = self.slot.lock();
        if let Some(cached) = slot.as_ref() {
            let fresh = match cached.expires_at {
                Some(at) => now < at,
                None => true,
            };
            if fresh {
                return Arc::clone(&cached.value);
            }
        }

        let value = Arc::new(compute());
        let expires_at = now.checked_add(self.ttl);
        *slot = Some(CacheSlot { value: Arc::clone(&value), expires_at });
        debug!(ttl_secs = self.ttl.as_secs(), "cache refreshed");
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn serves_the_same_value_within_ttl() {
        let cache = ReadCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let start = Instant::now();
        let compute = || calls.fetch_add(1, Ordering::SeqCst);

        let first = cache.get_or_refresh_at(start, compute);
        let later = cache.get_or_refresh_at(start + Duration::from_secs(59), compute);
        assert!(Arc::ptr_eq(&first, &later));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recomputes_once_expired() {
        let cache = ReadCache::new(Duration::from_secs(60));
        let start = Instant::now();

        let first = cache.get_or_refresh_at(start, || "first");
        let expired = cache.get_or_refresh_at(start + Duration::from_secs(60), || "second");
        assert_eq!(*first, "first");
        assert_eq!(*expired, "second");

        let still = cache.get_or_refresh_at(start + Duration::from_secs(90), || "third");
        assert_eq!(*still, "second");
    }

    #[test]
    fn unbounded_ttl_never_expires() {
        let cache = ReadCache::new(Duration::MAX);
        let start = Instant::now();

        let first = cache.get_or_refresh_at(start, || "first");
        let later = cache.get_or_refresh_at(start + Duration::from_secs(86_400 * 365), || "second");
        assert_eq!(*first, "first");
        assert!(Arc::ptr_eq(&first, &later));
    }

    #[test]
    fn concurrent_misses_compute_once() {
        let cache = ReadCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let values: Vec<Arc<usize>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| {
                        cache.get_or_refresh(|| {
                            std::thread::sleep(Duration::from_millis(20));
                            calls.fetch_add(1, Ordering::SeqCst)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }
}
