//! Clock sources for phase timing
//!
//! Phase timing is always computed by subtracting a start timestamp from the
//! current reading, so the clock only has to answer "what time is it now".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

/// Milliseconds since the Unix epoch
pub type Millis = u64;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    ///
    /// Must not go backwards within one run.
    fn now_ms(&self) -> Millis;
}

/// Wall clock anchored once at construction and advanced by a monotonic
/// `Instant`, so NTP adjustments during a run cannot move it backwards
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch_anchor_ms: Millis,
    instant_anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch_anchor_ms: Utc::now().timestamp_millis().max(0) as Millis,
            instant_anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        let elapsed = self.instant_anchor.elapsed().as_millis() as Millis;
        self.epoch_anchor_ms.saturating_add(elapsed)
    }
}

/// Manually advanced clock for deterministic tests and simulations
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now: Arc<AtomicU64>,
}

impl FakeClock {
    /// Create a fake clock reading `start_ms`
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as Millis, Ordering::SeqCst);
    }

    /// Move the clock forward by whole seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Set the clock to an arbitrary reading, including one in the past
    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}
