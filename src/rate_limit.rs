//! Token-bucket rate limiter
//!
//! Gates both ends of the pipeline: every controller owns one to bound how
//! often it attempts an update, and the dispatcher owns one to bound how
//! often the bridge is written to.

use std::time::{Duration, Instant};

/// Token bucket with a fixed refill rate and burst capacity
///
/// The bucket starts full. Each granted permit takes one token; tokens come
/// back continuously at `rate_hz` per second, never exceeding `burst`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    rate_hz: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter refilling `rate_hz` tokens per second, holding at most `burst`
    pub fn new(rate_hz: f64, burst: u32) -> Self {
        Self::new_at(rate_hz, burst, Instant::now())
    }

    /// Create a limiter refilling one token every `interval`
    pub fn every(interval: Duration, burst: u32) -> Self {
        let rate_hz = if interval.is_zero() {
            f64::INFINITY
        } else {
            1.0 / interval.as_secs_f64()
        };
        Self::new(rate_hz, burst)
    }

    fn new_at(rate_hz: f64, burst: u32, now: Instant) -> Self {
        let burst = burst as f64;
        Self {
            rate_hz: rate_hz.max(0.0),
            burst,
            tokens: burst,
            last_refill: now,
        }
    }

    /// Take one token if available
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Take one token if available at `now`
    ///
    /// Time never runs backwards for the bucket: an `Instant` earlier than the
    /// last refill adds nothing.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (fractional)
    pub fn available(&self) -> f64 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        self.last_refill = now;

        if self.rate_hz.is_infinite() {
            self.tokens = self.burst;
            return;
        }
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate_hz).min(self.burst);
    }
}
