use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use crossbeam_queue::SegQueue;

use meshlink_shared::Envelope;

use crate::LinkStateError;

pub const FEEDING_DOWN: u32 = 1 << 0;
pub const PULLING_DOWN: u32 = 1 << 1;
pub const FEEDING_UP: u32 = 1 << 2;
pub const PULLING_UP: u32 = 1 << 3;
/// Sticky: the link was opened with sync semantics
pub const SYNC: u32 = 1 << 4;
pub const CLOSED_UP: u32 = 1 << 5;
pub const CLOSED_DOWN: u32 = 1 << 6;

const FLOW_MASK: u32 = FEEDING_DOWN | PULLING_DOWN | FEEDING_UP | PULLING_UP;

/// One of the two independent directions of a link. Up travels toward the
/// lane, down travels toward the subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flow {
    Up,
    Down,
}

impl Flow {
    pub fn feeding(&self) -> u32 {
        match self {
            Flow::Up => FEEDING_UP,
            Flow::Down => FEEDING_DOWN,
        }
    }

    pub fn pulling(&self) -> u32 {
        match self {
            Flow::Up => PULLING_UP,
            Flow::Down => PULLING_DOWN,
        }
    }

    pub fn closed(&self) -> u32 {
        match self {
            Flow::Up => CLOSED_UP,
            Flow::Down => CLOSED_DOWN,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Up => f.write_str("up"),
            Flow::Down => f.write_str("down"),
        }
    }
}

/// The status word and the two FIFOs shared by every uplink and downlink.
///
/// Each direction runs the same feed/pull/complete cycle:
///
/// * `queue` appends an envelope and feeds the direction.
/// * `feed` sets `FEEDING_*`. If no pull was outstanding it also sets
///   `PULLING_*` and returns `true`, and the caller emits exactly one
///   notification. Otherwise the outstanding pull will pick the work up.
/// * `pull` dequeues one envelope. Only legal while `PULLING_*` is set.
/// * `push`/`skip` complete the pull. If more envelopes are waiting the pull
///   is re-armed and `true` is returned, so the caller notifies once more.
///
/// All transitions are compare-and-swap loops on one `AtomicU32`; no lock is
/// taken on the path of an envelope.
pub struct LinkState {
    status: AtomicU32,
    up_queue: SegQueue<Envelope>,
    down_queue: SegQueue<Envelope>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            status: AtomicU32::new(0),
            up_queue: SegQueue::new(),
            down_queue: SegQueue::new(),
        }
    }

    pub fn status(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    pub fn is_set(&self, bit: u32) -> bool {
        self.status() & bit != 0
    }

    pub fn is_pulling(&self, flow: Flow) -> bool {
        self.is_set(flow.pulling())
    }

    pub fn is_feeding(&self, flow: Flow) -> bool {
        self.is_set(flow.feeding())
    }

    pub fn len(&self, flow: Flow) -> usize {
        self.queue_of(flow).len()
    }

    pub fn is_empty(&self, flow: Flow) -> bool {
        self.queue_of(flow).is_empty()
    }

    // Feed / Pull / Complete

    /// Appends `envelope` to `flow` and feeds it. Returns `true` if the caller
    /// must notify its consumer.
    pub fn queue(&self, flow: Flow, envelope: Envelope) -> bool {
        self.queue_of(flow).push(envelope);
        self.feed(flow)
    }

    /// Returns `true` only when this call armed a new pull.
    pub fn feed(&self, flow: Flow) -> bool {
        let feeding = flow.feeding();
        let pulling = flow.pulling();
        let mut old = self.status.load(Ordering::Acquire);
        loop {
            let new = old | feeding | pulling;
            if new == old {
                return false;
            }
            match self
                .status
                .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return old & pulling == 0,
                Err(actual) => old = actual,
            }
        }
    }

    /// Dequeues the next envelope of an armed pull. `Ok(None)` means the
    /// queue was drained under the pull; complete it with `skip`.
    pub fn pull(&self, flow: Flow) -> Result<Option<Envelope>, LinkStateError> {
        if !self.is_pulling(flow) {
            return Err(LinkStateError::NotPulling { flow });
        }
        Ok(self.queue_of(flow).pop())
    }

    /// Completes a pull that delivered an envelope.
    pub fn push(&self, flow: Flow) -> Result<bool, LinkStateError> {
        self.complete(flow)
    }

    /// Completes a pull that found nothing to deliver.
    pub fn skip(&self, flow: Flow) -> Result<bool, LinkStateError> {
        self.complete(flow)
    }

    fn complete(&self, flow: Flow) -> Result<bool, LinkStateError> {
        let feeding = flow.feeding();
        let pulling = flow.pulling();
        let mut old = self.status.load(Ordering::Acquire);
        loop {
            if old & pulling == 0 {
                return Err(LinkStateError::PullMismatch { flow });
            }
            if !self.queue_of(flow).is_empty() {
                // more work: keep the pull armed and ask for another round
                return Ok(true);
            }
            let new = old & !(feeding | pulling);
            match self
                .status
                .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => old = actual,
            }
        }
        // a producer may have queued between the emptiness check and the swap
        if !self.queue_of(flow).is_empty() {
            return Ok(self.feed(flow));
        }
        Ok(false)
    }

    /// Drops an armed pull that has nowhere to go, leaving `FEEDING_*` set so
    /// the next feed re-arms it.
    pub fn park(&self, flow: Flow) {
        self.status.fetch_and(!flow.pulling(), Ordering::AcqRel);
    }

    /// Clears both directions' feed and pull bits; `SYNC` and the closed bits
    /// survive.
    pub fn reset(&self) {
        self.status.fetch_and(!FLOW_MASK, Ordering::AcqRel);
    }

    pub fn reset_flow(&self, flow: Flow) {
        self.status
            .fetch_and(!(flow.feeding() | flow.pulling()), Ordering::AcqRel);
    }

    /// Sets `bit`, returning `true` if it was previously clear.
    pub fn try_set(&self, bit: u32) -> bool {
        self.status.fetch_or(bit, Ordering::AcqRel) & bit == 0
    }

    pub fn unset(&self, bit: u32) {
        self.status.fetch_and(!bit, Ordering::AcqRel);
    }

    /// Discards everything waiting on `flow`, returning how many envelopes
    /// were dropped.
    pub fn clear(&self, flow: Flow) -> usize {
        let queue = self.queue_of(flow);
        let mut dropped = 0;
        while queue.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    fn queue_of(&self, flow: Flow) -> &SegQueue<Envelope> {
        match flow {
            Flow::Up => &self.up_queue,
            Flow::Down => &self.down_queue,
        }
    }
}

impl fmt::Debug for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkState")
            .field("status", &format_args!("{:#09b}", self.status()))
            .field("up_len", &self.up_queue.len())
            .field("down_len", &self.down_queue.len())
            .finish()
    }
}
