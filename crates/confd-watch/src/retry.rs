//! Retry delays for reopening dead watches

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

/// How long a watch loop waits before reopening a failed watch.
///
/// The default is a fixed one second. A multiplier above `1.0` turns it into
/// exponential backoff capped at `max`. The delay resets after every
/// successful open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// The same delay on every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
        }
    }

    /// Doubling delays starting at `initial`, capped at `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: 2.0,
        }
    }

    pub(crate) fn backoff(&self) -> RetryBackoff {
        let inner = ExponentialBackoff {
            current_interval: self.initial,
            initial_interval: self.initial,
            randomization_factor: 0.0,
            multiplier: self.multiplier.max(1.0),
            max_interval: self.max.max(self.initial),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        RetryBackoff {
            inner,
            cap: self.max.max(self.initial),
        }
    }
}

/// Iterator-like state over the delays of one [`RetryPolicy`].
pub(crate) struct RetryBackoff {
    inner: ExponentialBackoff,
    cap: Duration,
}

impl RetryBackoff {
    pub(crate) fn next_delay(&mut self) -> Duration {
        self.inner.next_backoff().unwrap_or(self.cap).min(self.cap)
    }

    pub(crate) fn reset(&mut self) {
        self.inner.reset();
    }
}
