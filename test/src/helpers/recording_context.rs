use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use meshlink_hub::{shared::Envelope, LaneError, LinkContext};

/// Local end of a link that records what it was sent. Feeds are counted;
/// tests answer each one with a pull on the link.
#[derive(Default)]
pub struct RecordingContext {
    feeds: AtomicUsize,
    pushed: Mutex<Vec<Envelope>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    closes: AtomicUsize,
    fail_push: AtomicBool,
}

impl RecordingContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Feeds not yet answered with a pull
    pub fn pending_feeds(&self) -> usize {
        self.feeds.load(Ordering::SeqCst)
    }

    /// Consumes one pending feed, if any.
    pub fn take_feed(&self) -> bool {
        self.feeds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |feeds| feeds.checked_sub(1))
            .is_ok()
    }

    pub fn pushed(&self) -> Vec<Envelope> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn take_pushed(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.pushed.lock().unwrap())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl LinkContext for RecordingContext {
    fn feed(&self) {
        self.feeds.fetch_add(1, Ordering::SeqCst);
    }

    fn push(&self, envelope: Envelope) -> Result<(), LaneError> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(LaneError::Rejected {
                reason: "context is failing".to_string(),
            });
        }
        self.pushed.lock().unwrap().push(envelope);
        Ok(())
    }

    fn did_connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn did_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn did_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
