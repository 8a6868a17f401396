use std::time::{Duration, Instant};

pub const DEFAULT_BURST: u32 = 20;
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_millis(500);

/// Token bucket guarding one socket: `burst` messages at once, then one more
/// every `refill_interval`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: u32,
    burst: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(DEFAULT_BURST, DEFAULT_REFILL_INTERVAL)
    }

    pub fn new_with_limits(burst: u32, refill_interval: Duration) -> Self {
        Self {
            tokens: burst,
            burst,
            refill_interval: refill_interval.max(Duration::from_millis(1)),
            last_refill: Instant::now(),
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.refill(Instant::now());

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = u32::try_from(elapsed.as_millis() / self.refill_interval.as_millis())
            .unwrap_or(u32::MAX);

        if earned >= self.burst {
            self.tokens = self.burst;
            self.last_refill = now;
        } else if earned > 0 {
            self.tokens = self.tokens.saturating_add(earned).min(self.burst);
            // Keep the remainder so slow trickles still add up
            self.last_refill += self.refill_interval * earned;
        }
    }

    pub fn remaining(&mut self) -> u32 {
        self.refill(Instant::now());
        self.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
