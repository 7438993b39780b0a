use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::debug;

use crate::FlowControl;

/// Counts envelopes that were accepted but not yet handed on, in each
/// direction, and decides when the transport should stop reading.
pub struct Backlog {
    max_send: usize,
    max_receive: usize,
    send: AtomicUsize,
    receive: AtomicUsize,
    read_paused: AtomicBool,
}

impl Backlog {
    pub fn new(max_send: usize, max_receive: usize) -> Self {
        Self {
            max_send,
            max_receive,
            send: AtomicUsize::new(0),
            receive: AtomicUsize::new(0),
            read_paused: AtomicBool::new(false),
        }
    }

    pub fn send_len(&self) -> usize {
        self.send.load(Ordering::Acquire)
    }

    pub fn receive_len(&self) -> usize {
        self.receive.load(Ordering::Acquire)
    }

    pub fn is_read_paused(&self) -> bool {
        self.read_paused.load(Ordering::Acquire)
    }

    pub fn sent_queued(&self) {
        self.send.fetch_add(1, Ordering::AcqRel);
    }

    pub fn sent_written(&self) {
        saturating_decrement(&self.send);
    }

    pub fn sent_dropped(&self, count: usize) {
        for _ in 0..count {
            saturating_decrement(&self.send);
        }
    }

    pub fn received_queued(&self) {
        self.receive.fetch_add(1, Ordering::AcqRel);
    }

    pub fn received_delivered(&self) {
        saturating_decrement(&self.receive);
    }

    pub fn received_dropped(&self, count: usize) {
        for _ in 0..count {
            saturating_decrement(&self.receive);
        }
    }

    pub fn clear_receive(&self) {
        self.receive.store(0, Ordering::Release);
    }

    /// Hands `apply` every flow control change that brings reading in line
    /// with the counts. Counts may move while a change is applied, so the
    /// bounds are checked again after each one.
    pub fn reconcile(&self, mut apply: impl FnMut(FlowControl)) {
        while let Some(flow_control) = self.next_flow_control() {
            apply(flow_control);
        }
    }

    fn next_flow_control(&self) -> Option<FlowControl> {
        let over = self.send_len() >= self.max_send || self.receive_len() >= self.max_receive;
        if over {
            if self
                .read_paused
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!(
                    "pausing reads: send backlog {}, receive backlog {}",
                    self.send_len(),
                    self.receive_len()
                );
                return Some(FlowControl::DisableRead);
            }
        } else if self
            .read_paused
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("resuming reads");
            return Some(FlowControl::EnableRead);
        }
        None
    }
}

fn saturating_decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
        count.checked_sub(1)
    });
}
