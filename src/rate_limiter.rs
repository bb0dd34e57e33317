use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-bucket rate limiter. Optionally fronts a collaborator class (venue,
/// pool, notifier); acquisition may suspend the caller.
pub struct RateLimiter {
    max_tokens: f64,
    refill_rate: f64,
    inner: Mutex<Inner>,
}

struct Inner {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            max_tokens,
            refill_rate,
            inner: Mutex::new(Inner { tokens: max_tokens, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, inner: &mut Inner) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(inner.last_refill).as_secs_f64();
        inner.tokens = (inner.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        inner.last_refill = now;
    }

    /// Blocks until `tokens` are available, then debits them.
    pub async fn acquire(&self, tokens: f64) {
        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                self.refill(&mut inner);
                if inner.tokens >= tokens {
                    inner.tokens -= tokens;
                    return;
                }
                let needed = tokens - inner.tokens;
                needed / self.refill_rate
            };
            tokio::time::sleep(tokio::time::Duration::from_secs_f64(wait)).await;
        }
    }

    /// Non-blocking: returns whether `tokens` were available and debited.
    pub async fn try_acquire(&self, tokens: f64) -> bool {
        let mut inner = self.inner.lock().await;
        self.refill(&mut inner);
        if inner.tokens >= tokens {
            inner.tokens -= tokens;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_acquire_succeeds_within_capacity() {
        let limiter = RateLimiter::new(5.0, 1.0);
        assert!(limiter.try_acquire(5.0).await);
        assert!(!limiter.try_acquire(1.0).await);
    }

    #[tokio::test]
    async fn try_acquire_never_overdraws() {
        let limiter = RateLimiter::new(1.0, 1.0);
        assert!(limiter.try_acquire(1.0).await);
        for _ in 0..3 {
            assert!(!limiter.try_acquire(1.0).await);
        }
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let limiter = RateLimiter::new(1.0, 1000.0); // fast refill for the test
        limiter.try_acquire(1.0).await;
        let start = Instant::now();
        limiter.acquire(1.0).await;
        assert!(start.elapsed().as_millis() < 100);
    }
}
