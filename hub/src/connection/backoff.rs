use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use crate::ReconnectConfig;

/// Exponential backoff between reconnect attempts.
///
/// The first delay after a successful connection is `initial_timeout` plus a
/// uniform jitter; each further failure multiplies the last delay, up to
/// `max_timeout`.
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    /// Last delay handed out, in milliseconds; zero once connected
    timeout_ms: AtomicU64,
}

impl ReconnectBackoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            timeout_ms: AtomicU64::new(0),
        }
    }

    /// The delay to wait before the next attempt.
    pub fn next_timeout(&self) -> Duration {
        let initial = self.config.initial_timeout.as_millis() as u64;
        let jitter = self.config.jitter.as_millis() as u64;
        let max = self.config.max_timeout.as_millis() as u64;
        let multiplier = self.config.multiplier;

        let mut next = 0;
        let _ = self
            .timeout_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |previous| {
                next = if previous == 0 {
                    initial + fastrand::u64(0..=jitter)
                } else {
                    let grown = (previous as f64 * multiplier) as u64;
                    u64::min(u64::max(grown, previous), max)
                };
                Some(next)
            });
        Duration::from_millis(next)
    }

    pub fn current_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Acquire))
    }

    pub fn reset(&self) {
        self.timeout_ms.store(0, Ordering::Release);
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
