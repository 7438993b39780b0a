use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Receives the periodic traffic profile of a hub
pub trait MetricsSink: Send + Sync {
    fn report(&self, profile: HostProfile);
}

/// Traffic of one class of links over the last report interval
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkPulse {
    pub link_count: u64,
    /// Per second, over the interval
    pub event_rate: u64,
    /// Since the hub was created
    pub event_count: u64,
    pub command_rate: u64,
    pub command_count: u64,
}

/// Raw envelope traffic on the connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AgentPulse {
    pub read_rate: u64,
    pub read_count: u64,
    pub write_rate: u64,
    pub write_count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostProfile {
    pub node_count: u64,
    pub agent_pulse: AgentPulse,
    pub downlink_pulse: LinkPulse,
    pub uplink_pulse: LinkPulse,
}

// Counter

/// Accumulates increments until sampled; sampling folds the pending delta
/// into the running total.
#[derive(Default)]
pub struct Counter {
    delta: AtomicU64,
    total: AtomicU64,
}

impl Counter {
    pub fn increment(&self) {
        self.delta.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `(delta, total)` and starts a new interval.
    pub fn sample(&self) -> (u64, u64) {
        let delta = self.delta.swap(0, Ordering::AcqRel);
        let total = self.total.fetch_add(delta, Ordering::AcqRel) + delta;
        (delta, total)
    }

    /// Everything counted so far, sampled or not
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Acquire) + self.delta.load(Ordering::Acquire)
    }
}

#[derive(Default)]
pub struct LinkCounters {
    pub open: Counter,
    pub close: Counter,
    pub event: Counter,
    pub command: Counter,
}

impl LinkCounters {
    /// Links opened and not yet closed
    pub fn link_count(&self) -> u64 {
        self.open.count().saturating_sub(self.close.count())
    }

    fn pulse(&self, dt_ms: u64) -> LinkPulse {
        let link_count = self.link_count();
        let (event_delta, event_count) = self.event.sample();
        let (command_delta, command_count) = self.command.sample();
        self.open.sample();
        self.close.sample();
        LinkPulse {
            link_count,
            event_rate: rate(event_delta, dt_ms),
            event_count,
            command_rate: rate(command_delta, dt_ms),
            command_count,
        }
    }
}

// HostMetrics

/// Traffic counters of one hub
pub struct HostMetrics {
    pub downlinks: LinkCounters,
    pub uplinks: LinkCounters,
    pub reads: Counter,
    pub writes: Counter,
    interval: Duration,
    epoch: Instant,
    /// Milliseconds after `epoch` of the last report
    last_report_ms: AtomicU64,
}

impl HostMetrics {
    pub fn new(interval: Duration) -> Self {
        Self {
            downlinks: LinkCounters::default(),
            uplinks: LinkCounters::default(),
            reads: Counter::default(),
            writes: Counter::default(),
            interval,
            epoch: Instant::now(),
            last_report_ms: AtomicU64::new(0),
        }
    }

    /// Samples every counter into a profile if at least one interval passed
    /// since the last one. Concurrent callers produce at most one profile.
    pub fn report_if_due(&self, now: Instant, node_count: usize) -> Option<HostProfile> {
        let now_ms = now.saturating_duration_since(self.epoch).as_millis() as u64;
        let interval_ms = self.interval.as_millis() as u64;
        let last_ms = self.last_report_ms.load(Ordering::Acquire);
        let dt_ms = now_ms.checked_sub(last_ms)?;
        if dt_ms < interval_ms || dt_ms == 0 {
            return None;
        }
        self.last_report_ms
            .compare_exchange(last_ms, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let (read_delta, read_count) = self.reads.sample();
        let (write_delta, write_count) = self.writes.sample();
        Some(HostProfile {
            node_count: node_count as u64,
            agent_pulse: AgentPulse {
                read_rate: rate(read_delta, dt_ms),
                read_count,
                write_rate: rate(write_delta, dt_ms),
                write_count,
            },
            downlink_pulse: self.downlinks.pulse(dt_ms),
            uplink_pulse: self.uplinks.pulse(dt_ms),
        })
    }
}

fn rate(delta: u64, dt_ms: u64) -> u64 {
    delta.saturating_mul(1000) / dt_ms
}
