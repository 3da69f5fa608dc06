//! Process-wide rate limiting.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Window {
    started: Instant,
    used: u32,
}

/// Fixed-window rate limiter shared across the whole process
///
/// One instance must be shared (via `Arc`) by every coordination round;
/// per-round limiters would let concurrent rounds exceed the remote
/// system's real limit. Waiting suspends only the calling task.
pub struct RateLimiter {
    rate: u32,
    period: Duration,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Create a limiter permitting `rate` calls per `period`
    #[must_use]
    pub fn new(rate: u32, period: Duration) -> Self {
        Self {
            rate: rate.max(1),
            period,
            window: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Acquire one invocation permit, waiting for the next window if the
    /// current one is exhausted
    pub async fn acquire(&self) {
        loop {
            let wake_at = {
                let mut window = self.window.lock().await;
                let now = Instant::now();

                if now.duration_since(window.started) >= self.period {
                    window.started = now;
                    window.used = 0;
                }

                if window.used < self.rate {
                    window.used += 1;
                    return;
                }

                window.started + self.period
            };

            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Configured permits per window
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Configured window length
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}
