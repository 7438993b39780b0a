use std::{
    fmt,
    sync::{Arc, Weak},
};

use log::{debug, trace, warn};

use meshlink_shared::{Envelope, EnvelopeKind, LinkKey, Uri};

use crate::{
    link::link_state::{CLOSED_DOWN, CLOSED_UP},
    Flow, LaneError, LinkContext, LinkError, LinkState, PullOutcome, PullRequest, RemoteLinkHub,
};

/// A local subscriber's link to a lane hosted by the peer.
///
/// Requests from the subscriber queue up and are written to the transport
/// one pull at a time, re-addressed to the node URI the peer knows.
/// Events from the peer queue down and are pulled by the subscriber's
/// binding.
pub struct RemoteUplink {
    hub: Weak<RemoteLinkHub>,
    me: Weak<RemoteUplink>,
    binding: Arc<dyn LinkContext>,
    node_uri: Uri,
    lane_uri: Uri,
    remote_node_uri: Uri,
    link_key: LinkKey,
    state: LinkState,
}

impl RemoteUplink {
    pub(crate) fn new(
        hub: Weak<RemoteLinkHub>,
        binding: Arc<dyn LinkContext>,
        node_uri: Uri,
        lane_uri: Uri,
        remote_node_uri: Uri,
        link_key: LinkKey,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            hub,
            me: me.clone(),
            binding,
            node_uri,
            lane_uri,
            remote_node_uri,
            link_key,
            state: LinkState::new(),
        })
    }

    /// The node URI as resolved against this connection
    pub fn node_uri(&self) -> &Uri {
        &self.node_uri
    }

    pub fn lane_uri(&self) -> &Uri {
        &self.lane_uri
    }

    /// The node URI as the peer addresses it
    pub fn remote_node_uri(&self) -> &Uri {
        &self.remote_node_uri
    }

    pub fn link_key(&self) -> LinkKey {
        self.link_key
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_set(CLOSED_DOWN)
    }

    // Up: subscriber to peer

    /// Queues a request for the peer's lane.
    pub fn queue_up(&self, envelope: Envelope) -> Result<(), LinkError> {
        let kind = envelope.kind();
        if !matches!(
            kind,
            EnvelopeKind::Link | EnvelopeKind::Sync | EnvelopeKind::Command | EnvelopeKind::Unlink
        ) {
            return Err(LinkError::UnsupportedEnvelope {
                link: "uplink",
                flow: Flow::Up,
                kind,
            });
        }
        if self.state.is_set(CLOSED_UP) {
            return Err(LinkError::Closed);
        }
        let hub = self.hub.upgrade().ok_or(LinkError::HubDropped)?;
        if kind == EnvelopeKind::Command {
            hub.metrics().uplinks.command.increment();
        }
        hub.backlog().sent_queued();
        hub.reconcile_backlog();
        if self.state.queue(Flow::Up, envelope) {
            self.notify_up(&hub);
        }
        Ok(())
    }

    /// Writes the next queued request to the transport. Called once per
    /// `Transport::feed`.
    pub fn pull_up(&self) -> PullOutcome {
        let Some(hub) = self.hub.upgrade() else {
            return PullOutcome::Failed(LinkError::HubDropped);
        };
        let envelope = match self.state.pull(Flow::Up) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                if let Ok(true) = self.state.skip(Flow::Up) {
                    self.notify_up(&hub);
                }
                return PullOutcome::Skipped;
            }
            Err(error) => {
                debug!("dropping stale pull on uplink {:?}: {}", self.lane_uri, error);
                return PullOutcome::Failed(error.into());
            }
        };
        hub.backlog().sent_written();
        let written = envelope
            .with_node_uri(self.remote_node_uri.clone())
            .map_err(LinkError::from)
            .and_then(|envelope| hub.write_envelope(envelope).map_err(LinkError::from));
        hub.reconcile_backlog();
        match self.state.push(Flow::Up) {
            Ok(true) => self.notify_up(&hub),
            Ok(false) => {}
            Err(error) => trace!("uplink {:?} was reset mid-pull: {}", self.lane_uri, error),
        }
        match written {
            Ok(()) => PullOutcome::Delivered,
            Err(error) => {
                warn!("failed to write to {:?} {:?}: {}", self.remote_node_uri, self.lane_uri, error);
                PullOutcome::Failed(error)
            }
        }
    }

    fn notify_up(&self, hub: &RemoteLinkHub) {
        if let Some(me) = self.me.upgrade() {
            hub.feed(PullRequest::Uplink(me));
        }
    }

    // Down: peer to subscriber

    /// Queues a response from the peer for the subscriber.
    pub fn queue_down(&self, envelope: Envelope) -> Result<(), LinkError> {
        let kind = envelope.kind();
        if !kind.is_response() {
            return Err(LinkError::UnsupportedEnvelope {
                link: "uplink",
                flow: Flow::Down,
                kind,
            });
        }
        if self.state.is_set(CLOSED_DOWN) {
            return Err(LinkError::Closed);
        }
        if let Some(hub) = self.hub.upgrade() {
            if kind == EnvelopeKind::Event {
                hub.metrics().uplinks.event.increment();
            }
            hub.backlog().received_queued();
            hub.reconcile_backlog();
        }
        if self.state.queue(Flow::Down, envelope) {
            self.binding.feed();
        }
        Ok(())
    }

    /// Delivers the next queued response to the subscriber. Called by the
    /// binding once per `LinkContext::feed`.
    pub fn pull_down(&self) -> PullOutcome {
        let envelope = match self.state.pull(Flow::Down) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                if let Ok(true) = self.state.skip(Flow::Down) {
                    self.binding.feed();
                }
                return PullOutcome::Skipped;
            }
            Err(error) => {
                debug!("dropping stale pull on uplink {:?}: {}", self.lane_uri, error);
                return PullOutcome::Failed(error.into());
            }
        };
        let unlinked = envelope.kind() == EnvelopeKind::Unlinked;
        let delivered = self.binding.push(envelope);
        if let Some(hub) = self.hub.upgrade() {
            hub.backlog().received_delivered();
            hub.reconcile_backlog();
        }
        match self.state.push(Flow::Down) {
            Ok(true) => self.binding.feed(),
            Ok(false) => {}
            Err(error) => trace!("uplink {:?} was reset mid-pull: {}", self.lane_uri, error),
        }
        match delivered {
            Ok(()) => {
                if unlinked {
                    self.close_down();
                }
                PullOutcome::Delivered
            }
            Err(error) => {
                self.did_fail_up(&error);
                PullOutcome::Failed(error.into())
            }
        }
    }

    fn did_fail_up(&self, error: &LaneError) {
        warn!(
            "subscriber of {:?} {:?} failed, closing its link: {}",
            self.node_uri, self.lane_uri, error
        );
        self.close_up();
        self.close_down();
    }

    // Lifecycle

    pub fn did_connect(&self) {
        self.binding.did_connect();
        if let Some(hub) = self.hub.upgrade() {
            if !self.state.is_empty(Flow::Up) && self.state.feed(Flow::Up) {
                self.notify_up(&hub);
            }
        }
        if !self.state.is_empty(Flow::Down) && self.state.feed(Flow::Down) {
            self.binding.feed();
        }
    }

    pub fn did_disconnect(&self) {
        self.state.reset();
        self.binding.did_disconnect();
    }

    /// The subscriber is done with this link. Closing the last uplink of a
    /// lane unlinks it at the peer.
    pub fn close_up(&self) {
        if !self.state.try_set(CLOSED_UP) {
            return;
        }
        match self.hub.upgrade() {
            Some(hub) => hub.close_uplink(self),
            None => self.close_down(),
        }
    }

    /// Ends delivery to the subscriber. Only the first call has an effect.
    pub fn close_down(&self) {
        if !self.state.try_set(CLOSED_DOWN) {
            return;
        }
        self.state.try_set(CLOSED_UP);
        let dropped_up = self.state.clear(Flow::Up);
        let dropped_down = self.state.clear(Flow::Down);
        if let Some(hub) = self.hub.upgrade() {
            hub.backlog().sent_dropped(dropped_up);
            hub.backlog().received_dropped(dropped_down);
            hub.reconcile_backlog();
            hub.metrics().uplinks.close.increment();
        }
        debug!("closed uplink {} to {:?} {:?}", self.link_key, self.node_uri, self.lane_uri);
        self.binding.did_close();
    }
}

impl fmt::Debug for RemoteUplink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteUplink")
            .field("node_uri", &self.node_uri)
            .field("lane_uri", &self.lane_uri)
            .field("remote_node_uri", &self.remote_node_uri)
            .field("link_key", &self.link_key)
            .field("state", &self.state)
            .finish()
    }
}
