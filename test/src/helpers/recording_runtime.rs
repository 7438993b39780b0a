use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use meshlink_hub::{
    shared::{Envelope, Uri},
    LaneError, LaneRuntime, LinkContext, RemoteDownlink,
};

use crate::RecordingContext;

/// Lane runtime that hands every downlink a fresh `RecordingContext`
#[derive(Default)]
pub struct RecordingRuntime {
    opened: Mutex<Vec<(Uri, Uri, Arc<RecordingContext>)>>,
    closed: Mutex<Vec<(Uri, Uri)>>,
    commands: Mutex<Vec<Envelope>>,
    missing_lanes: Mutex<Vec<Uri>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    closes: AtomicUsize,
    fail_close: AtomicBool,
}

impl RecordingRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `open_downlink` fail for `lane_uri`.
    pub fn remove_lane(&self, lane_uri: impl Into<Uri>) {
        self.missing_lanes.lock().unwrap().push(lane_uri.into());
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// The most recent context opened for the address
    pub fn context(&self, node_uri: &str, lane_uri: &str) -> Option<Arc<RecordingContext>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(node, lane, _)| node.as_str() == node_uri && lane.as_str() == lane_uri)
            .map(|(_, _, context)| context.clone())
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn closed(&self) -> Vec<(Uri, Uri)> {
        self.closed.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<Envelope> {
        self.commands.lock().unwrap().clone()
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

impl LaneRuntime for RecordingRuntime {
    fn open_downlink(
        &self,
        downlink: &Arc<RemoteDownlink>,
    ) -> Result<Arc<dyn LinkContext>, LaneError> {
        if self.missing_lanes.lock().unwrap().contains(downlink.lane_uri()) {
            return Err(LaneError::LaneNotFound {
                node_uri: downlink.node_uri().to_string(),
                lane_uri: downlink.lane_uri().to_string(),
            });
        }
        let context = RecordingContext::new();
        self.opened.lock().unwrap().push((
            downlink.node_uri().clone(),
            downlink.lane_uri().clone(),
            context.clone(),
        ));
        Ok(context)
    }

    fn close_downlink(&self, downlink: &RemoteDownlink) -> Result<(), LaneError> {
        self.closed
            .lock()
            .unwrap()
            .push((downlink.node_uri().clone(), downlink.lane_uri().clone()));
        Ok(())
    }

    fn push_command(&self, envelope: Envelope) {
        self.commands.lock().unwrap().push(envelope);
    }

    fn did_connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn did_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) -> Result<(), LaneError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(LaneError::CloseFailed {
                reason: "lanes still draining".to_string(),
            });
        }
        Ok(())
    }
}
