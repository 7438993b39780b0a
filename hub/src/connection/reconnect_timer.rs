use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use log::trace;

/// Arms and disarms the reconnect timer. The embedder calls
/// `RemoteLinkHub::reconnect` when an armed timer fires.
pub trait ClockScheduler: Send + Sync {
    fn schedule_reconnect(&self, delay: Duration);

    fn cancel_reconnect(&self);
}

/// A `ClockScheduler` for hosts that drive the hub from a polling loop
pub struct ReconnectTimer {
    epoch: Instant,
    /// Milliseconds after `epoch`, `UNSET` while disarmed
    deadline_ms: AtomicU64,
}

const UNSET: u64 = u64::MAX;

impl ReconnectTimer {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            deadline_ms: AtomicU64::new(UNSET),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.load(Ordering::Acquire) != UNSET
    }

    /// Time left until the timer fires, if armed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let deadline = self.deadline_ms.load(Ordering::Acquire);
        if deadline == UNSET {
            return None;
        }
        Some(Duration::from_millis(deadline.saturating_sub(self.millis_at(now))))
    }

    pub fn ringing(&self, now: Instant) -> bool {
        let deadline = self.deadline_ms.load(Ordering::Acquire);
        deadline != UNSET && self.millis_at(now) >= deadline
    }

    /// Disarms and returns `true` if the timer was ringing. Only one caller
    /// observes each ring.
    pub fn take_ringing(&self, now: Instant) -> bool {
        let now_ms = self.millis_at(now);
        self.deadline_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |deadline| {
                if deadline != UNSET && now_ms >= deadline {
                    Some(UNSET)
                } else {
                    None
                }
            })
            .is_ok()
    }

    fn millis_at(&self, instant: Instant) -> u64 {
        instant.saturating_duration_since(self.epoch).as_millis() as u64
    }
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockScheduler for ReconnectTimer {
    fn schedule_reconnect(&self, delay: Duration) {
        let deadline = self
            .millis_at(Instant::now())
            .saturating_add(delay.as_millis() as u64)
            .min(UNSET - 1);
        trace!("reconnect timer armed for {:?}", delay);
        self.deadline_ms.store(deadline, Ordering::Release);
    }

    fn cancel_reconnect(&self) {
        self.deadline_ms.store(UNSET, Ordering::Release);
    }
}
