use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;

/// Time source for debouncing.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when told to. `sleep` advances it immediately.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self
            .elapsed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *elapsed += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = *self
            .elapsed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.origin + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// A value that follows its input once the input has been quiet for
/// `quiet_period`.
#[derive(Debug, Clone)]
pub struct Debounced<V> {
    pending: V,
    settled: V,
    last_input: Option<Instant>,
    quiet_period: Duration,
}

impl<V: Clone + PartialEq> Debounced<V> {
    pub fn new(initial: V, quiet_period: Duration) -> Self {
        Self {
            pending: initial.clone(),
            settled: initial,
            last_input: None,
            quiet_period,
        }
    }

    pub fn input(&mut self, value: V, now: Instant) {
        self.pending = value;
        self.last_input = Some(now);
    }

    /// Time left before the pending value settles, `None` when nothing is pending.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last_input = self.last_input?;
        let deadline = last_input + self.quiet_period;
        Some(deadline.saturating_duration_since(now))
    }

    /// Commits the pending value if the quiet period has elapsed.
    /// Returns `true` when the settled value changed.
    pub fn settle(&mut self, now: Instant) -> bool {
        match self.remaining(now) {
            Some(left) if left.is_zero() => {
                self.last_input = None;
                if self.settled == self.pending {
                    return false;
                }
                self.settled = self.pending.clone();
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> &V {
        &self.pending
    }

    pub fn settled(&self) -> &V {
        &self.settled
    }
}
