//! A token-bucket rate limiter for the downloader provider client,
//! grounded on the teacher's `InMemoryBudget` (`Arc<tokio::sync::Mutex<..>>`
//! guarding a plain counter, refilled lazily on acquire rather than by a
//! background tick). The original implementation ran two of these side by
//! side — a tight one for the `torrents` endpoints and a looser one for
//! everything else — which `DownloaderSettings` reproduces as two
//! independent `RateLimiter`s rather than one shared budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// `capacity` tokens refill every `interval`. `RateLimiter::new(1, Duration::from_secs(1))`
/// reproduces the original `RateLimiter(1, 1)`.
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<BucketState>>,
    capacity: u32,
    interval: Duration,
}

impl RateLimiter {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            capacity,
            interval,
        }
    }

    /// Blocks until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens > 0 {
                    state.tokens -= 1;
                    None
                } else {
                    Some(self.interval.saturating_sub(state.last_refill.elapsed()))
                }
            };

            match wait {
                None => return,
                Some(duration) => sleep(duration.max(Duration::from_millis(1))).await,
            }
        }
    }

    fn refill(&self, state: &mut BucketState) {
        if state.last_refill.elapsed() >= self.interval {
            state.tokens = self.capacity;
            state.last_refill = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_then_refills_after_interval() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        limiter.acquire().await;

        let started = Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
