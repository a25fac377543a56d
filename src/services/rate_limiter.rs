use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Duration, Instant};
use parking_lot::Mutex;

/// Rate limiter for outbound provider calls.
///
/// Keeps the live-quote poller inside the provider's free-tier quota when
/// every tracked symbol is fetched concurrently.
pub struct RateLimiter {
    /// Semaphore to limit concurrent requests
    semaphore: Arc<Semaphore>,
    /// Earliest instant the next request may start
    next_slot: Mutex<Option<Instant>>,
    /// Minimum spacing between request starts
    min_delay: Duration,
}

impl RateLimiter {
    /// # Arguments
    /// * `max_concurrent` - Maximum number of in-flight requests
    /// * `requests_per_minute` - Request starts allowed per minute
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        let min_delay_ms = 60_000 / requests_per_minute.max(1) as u64;
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            next_slot: Mutex::new(None),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// Wait for a concurrency permit and for this caller's start slot.
    ///
    /// Slots are reserved under the lock and slept on outside it, so
    /// concurrent callers are spaced `min_delay` apart instead of all waking
    /// together. The permit is released when the guard drops.
    pub async fn acquire(&self) -> RateLimitGuard {
        // The semaphore is never closed, so this only fails if that changes
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        let start_at = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_delay);
            slot
        };

        sleep_until(start_at).await;

        RateLimitGuard { _permit: permit }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Holds a concurrency permit until dropped.
pub struct RateLimitGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_enforces_delay() {
        // 60 per minute = one request start per second
        let limiter = RateLimiter::new(2, 60);
        let start = Instant::now();

        let guard1 = limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100), "First request should be immediate");
        drop(guard1);

        let _guard2 = limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000), "Second request should wait ~1 second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_get_distinct_slots() {
        let limiter = Arc::new(RateLimiter::new(3, 120)); // 500ms spacing
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _guard = limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        assert!(elapsed[0] < Duration::from_millis(100));
        assert!(elapsed[1] >= Duration::from_millis(500));
        assert!(elapsed[2] >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let limiter = RateLimiter::new(1, 6000);

        let guard = limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);
        drop(guard);
        assert_eq!(limiter.available_permits(), 1);
    }
}
