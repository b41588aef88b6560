//! Time, sleeping and randomness capabilities.
//!
//! The worker never reads the wall clock, sleeps or draws random numbers
//! directly. It goes through these traits so tests can substitute
//! deterministic implementations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspends the current invocation.
#[async_trait]
pub trait Delay: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Picks the randomized pause between thread steps.
pub trait JitterSource: Send + Sync {
    /// A duration in `[min, max]`. Returns `min` when the range is empty.
    fn pick(&self, min: Duration, max: Duration) -> Duration;
}

/// Uniform jitter from the thread-local RNG, at millisecond resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn pick(&self, min: Duration, max: Duration) -> Duration {
        pick_millis(&mut rand::thread_rng(), min, max)
    }
}

/// Draw a duration in `[min, max]` from `rng`.
pub(crate) fn pick_millis<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    let lo = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
    let hi = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if hi <= lo {
        return min;
    }
    Duration::from_millis(rng.gen_range(lo..=hi))
}
