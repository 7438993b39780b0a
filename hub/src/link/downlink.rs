use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use arc_swap::ArcSwapOption;
use log::{debug, info, trace, warn};

use meshlink_shared::{Envelope, EnvelopeKind, LinkRequest, SyncRequest, Uri, Value};

use crate::{
    link::link_state::{CLOSED_DOWN, CLOSED_UP, SYNC},
    Flow, LaneError, LinkContext, LinkError, LinkState, PullOutcome, PullRequest, RemoteLinkHub,
};

/// The peer's link to a lane hosted on this side. There is at most one per
/// `(node_uri, lane_uri)`; every link or sync request the peer sends for that
/// lane goes through it.
///
/// Requests from the peer queue up and are pulled by the lane's context.
/// Events from the lane queue down and are written to the transport one pull
/// at a time.
pub struct RemoteDownlink {
    hub: Weak<RemoteLinkHub>,
    me: Weak<RemoteDownlink>,
    remote_node_uri: Uri,
    node_uri: Uri,
    lane_uri: Uri,
    prio: f32,
    rate: f32,
    body: Value,
    context: ArcSwapOption<ContextSlot>,
    state: LinkState,
    /// Set while the connection is down; the next connect reopens the link
    disconnected: AtomicBool,
}

struct ContextSlot(Arc<dyn LinkContext>);

impl RemoteDownlink {
    pub(crate) fn new(
        hub: Weak<RemoteLinkHub>,
        remote_node_uri: Uri,
        node_uri: Uri,
        lane_uri: Uri,
        prio: f32,
        rate: f32,
        body: Value,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            hub,
            me: me.clone(),
            remote_node_uri,
            node_uri,
            lane_uri,
            prio,
            rate,
            body,
            context: ArcSwapOption::empty(),
            state: LinkState::new(),
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn node_uri(&self) -> &Uri {
        &self.node_uri
    }

    pub fn lane_uri(&self) -> &Uri {
        &self.lane_uri
    }

    /// The node URI the peer addressed this lane by
    pub fn remote_node_uri(&self) -> &Uri {
        &self.remote_node_uri
    }

    pub fn prio(&self) -> f32 {
        self.prio
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    /// Whether the peer ever asked to sync; reopening re-syncs if so
    pub fn is_sync(&self) -> bool {
        self.state.is_set(SYNC)
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_set(CLOSED_DOWN)
    }

    pub fn has_context(&self) -> bool {
        self.context.load().is_some()
    }

    /// Binds the lane context that receives this link's requests.
    pub(crate) fn attach(&self, context: Arc<dyn LinkContext>) {
        self.context.store(Some(Arc::new(ContextSlot(context))));
        if !self.state.is_empty(Flow::Up) && self.state.feed(Flow::Up) {
            self.notify_up();
        }
    }

    // Up: peer to lane

    pub fn queue_up(&self, envelope: Envelope) -> Result<(), LinkError> {
        let kind = envelope.kind();
        if !kind.is_request() {
            return Err(LinkError::UnsupportedEnvelope {
                link: "downlink",
                flow: Flow::Up,
                kind,
            });
        }
        if self.state.is_set(CLOSED_UP) {
            return Err(LinkError::Closed);
        }
        if kind == EnvelopeKind::Sync {
            self.state.try_set(SYNC);
        }
        if let Some(hub) = self.hub.upgrade() {
            if kind == EnvelopeKind::Command {
                hub.metrics().downlinks.command.increment();
            }
            hub.backlog().received_queued();
            hub.reconcile_backlog();
        }
        if self.state.queue(Flow::Up, envelope) {
            self.notify_up();
        }
        Ok(())
    }

    fn notify_up(&self) {
        loop {
            if let Some(slot) = self.context.load_full() {
                slot.0.feed();
                return;
            }
            // no context yet; `attach` re-feeds once one is bound
            self.state.park(Flow::Up);
            if self.context.load().is_none() || !self.state.feed(Flow::Up) {
                return;
            }
        }
    }

    /// Hands the next queued request to the lane context. Called by the
    /// context once per `LinkContext::feed`.
    pub fn pull_up(&self) -> PullOutcome {
        let Some(slot) = self.context.load_full() else {
            self.state.park(Flow::Up);
            return PullOutcome::Skipped;
        };
        let envelope = match self.state.pull(Flow::Up) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                if let Ok(true) = self.state.skip(Flow::Up) {
                    self.notify_up();
                }
                return PullOutcome::Skipped;
            }
            Err(error) => {
                debug!("dropping stale pull on downlink {:?}: {}", self.lane_uri, error);
                return PullOutcome::Failed(error.into());
            }
        };
        let delivered = slot.0.push(envelope);
        if let Some(hub) = self.hub.upgrade() {
            hub.backlog().received_delivered();
            hub.reconcile_backlog();
        }
        match self.state.push(Flow::Up) {
            Ok(true) => self.notify_up(),
            Ok(false) => {}
            Err(error) => trace!("downlink {:?} was reset mid-pull: {}", self.lane_uri, error),
        }
        match delivered {
            Ok(()) => PullOutcome::Delivered,
            Err(error) => {
                let current = self
                    .context
                    .load_full()
                    .is_some_and(|current| Arc::ptr_eq(&current, &slot));
                if current {
                    self.did_fail_up(&error);
                }
                PullOutcome::Failed(error.into())
            }
        }
    }

    fn did_fail_up(&self, error: &LaneError) {
        warn!(
            "lane {:?} {:?} failed, closing the peer's link: {}",
            self.node_uri, self.lane_uri, error
        );
        self.close_up();
    }

    // Down: lane to peer

    /// Queues a response from the lane for the peer.
    pub fn queue_down(&self, envelope: Envelope) -> Result<(), LinkError> {
        let kind = envelope.kind();
        if !kind.is_response() {
            return Err(LinkError::UnsupportedEnvelope {
                link: "downlink",
                flow: Flow::Down,
                kind,
            });
        }
        if self.state.is_set(CLOSED_DOWN) {
            return Err(LinkError::Closed);
        }
        let hub = self.hub.upgrade().ok_or(LinkError::HubDropped)?;
        if kind == EnvelopeKind::Event {
            hub.metrics().downlinks.event.increment();
        }
        hub.backlog().sent_queued();
        hub.reconcile_backlog();
        if self.state.queue(Flow::Down, envelope) {
            self.notify_down(&hub);
        }
        Ok(())
    }

    /// Writes the next queued response to the transport. Called once per
    /// `Transport::feed`.
    pub fn pull_down(&self) -> PullOutcome {
        let Some(hub) = self.hub.upgrade() else {
            return PullOutcome::Failed(LinkError::HubDropped);
        };
        let envelope = match self.state.pull(Flow::Down) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                if let Ok(true) = self.state.skip(Flow::Down) {
                    self.notify_down(&hub);
                }
                return PullOutcome::Skipped;
            }
            Err(error) => {
                debug!("dropping stale pull on downlink {:?}: {}", self.lane_uri, error);
                return PullOutcome::Failed(error.into());
            }
        };
        hub.backlog().sent_written();
        let written = envelope
            .with_node_uri(self.remote_node_uri.clone())
            .map_err(LinkError::from)
            .and_then(|envelope| hub.write_envelope(envelope).map_err(LinkError::from));
        hub.reconcile_backlog();
        match self.state.push(Flow::Down) {
            Ok(true) => self.notify_down(&hub),
            Ok(false) => {}
            Err(error) => trace!("downlink {:?} was reset mid-pull: {}", self.lane_uri, error),
        }
        match written {
            Ok(()) => PullOutcome::Delivered,
            Err(error) => {
                warn!("failed to write to {:?} {:?}: {}", self.remote_node_uri, self.lane_uri, error);
                PullOutcome::Failed(error)
            }
        }
    }

    fn notify_down(&self, hub: &RemoteLinkHub) {
        if let Some(me) = self.me.upgrade() {
            hub.feed(PullRequest::Downlink(me));
        }
    }

    // Lifecycle

    /// Resumes both flows, or reopens the link if the connection dropped
    /// since it was last up.
    pub fn did_connect(&self) {
        if self.disconnected.swap(false, Ordering::AcqRel) {
            self.did_reconnect();
            return;
        }
        if let Some(slot) = self.context.load_full() {
            slot.0.did_connect();
        }
        if !self.state.is_empty(Flow::Up) && self.state.feed(Flow::Up) {
            self.notify_up();
        }
        if let Some(hub) = self.hub.upgrade() {
            if !self.state.is_empty(Flow::Down) && self.state.feed(Flow::Down) {
                self.notify_down(&hub);
            }
        }
    }

    fn did_reconnect(&self) {
        if let Err(error) = self.reopen() {
            warn!(
                "failed to reopen downlink {:?} {:?} after reconnecting: {}",
                self.node_uri, self.lane_uri, error
            );
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            if !self.state.is_empty(Flow::Down) && self.state.feed(Flow::Down) {
                self.notify_down(&hub);
            }
        }
    }

    /// Resets both flows and discards responses that never reached the peer.
    /// The `SYNC` bit survives for the `reopen` on the next connect.
    pub fn did_disconnect(&self) {
        self.disconnected.store(true, Ordering::Release);
        self.state.reset();
        let dropped = self.state.clear(Flow::Down);
        if let Some(hub) = self.hub.upgrade() {
            hub.backlog().sent_dropped(dropped);
        }
        if let Some(slot) = self.context.load_full() {
            slot.0.did_disconnect();
        }
    }

    /// Replaces the lane context with a fresh one and re-issues the original
    /// link, or sync if the peer ever synced, without the peer noticing.
    ///
    /// Fails with `Superseded` if the peer has since linked the lane again
    /// through another downlink. If the lane cannot be reopened the link is
    /// closed and the peer told so.
    pub fn reopen(&self) -> Result<(), LinkError> {
        let hub = self.hub.upgrade().ok_or(LinkError::HubDropped)?;
        let me = self.me.upgrade().ok_or(LinkError::HubDropped)?;
        let runtime = hub.runtime();

        if !hub.register_downlink(&me) {
            debug!("downlink {:?} {:?} was superseded", self.node_uri, self.lane_uri);
            return Err(LinkError::Superseded);
        }
        self.disconnected.store(false, Ordering::Release);

        if let Some(slot) = self.context.swap(None) {
            slot.0.did_close();
            if let Err(error) = runtime.close_downlink(self) {
                warn!("failed to close lane context of {:?}: {}", self.lane_uri, error);
            }
        }
        self.state.reset_flow(Flow::Up);
        let dropped = self.state.clear(Flow::Up);
        hub.backlog().received_dropped(dropped);
        let was_closed = self.state.is_set(CLOSED_DOWN);
        self.state.unset(CLOSED_UP | CLOSED_DOWN);
        if was_closed {
            hub.metrics().downlinks.open.increment();
        }

        let context = match runtime.open_downlink(&me) {
            Ok(context) => context,
            Err(error) => {
                self.close_up();
                return Err(error.into());
            }
        };
        self.attach(context);

        let request: Envelope = if self.is_sync() {
            SyncRequest::with_params(
                self.node_uri.clone(),
                self.lane_uri.clone(),
                self.prio,
                self.rate,
                self.body.clone(),
            )
            .into()
        } else {
            LinkRequest::with_params(
                self.node_uri.clone(),
                self.lane_uri.clone(),
                self.prio,
                self.rate,
                self.body.clone(),
            )
            .into()
        };
        info!(
            "reopening downlink {:?} {:?} with a {} request",
            self.node_uri,
            self.lane_uri,
            request.kind()
        );
        self.queue_up(request)
    }

    /// The lane is done with this link: unregister it and tell the peer.
    pub fn close_up(&self) {
        if !self.state.try_set(CLOSED_UP) {
            return;
        }
        match self.hub.upgrade() {
            Some(hub) => hub.close_downlink(self),
            None => {
                if let Err(error) = self.close_down() {
                    warn!("failed to close downlink {:?}: {}", self.lane_uri, error);
                }
            }
        }
    }

    /// Releases the lane context. Only the first call has an effect.
    pub fn close_down(&self) -> Result<(), LaneError> {
        if !self.state.try_set(CLOSED_DOWN) {
            return Ok(());
        }
        self.state.try_set(CLOSED_UP);
        let dropped_up = self.state.clear(Flow::Up);
        let dropped_down = self.state.clear(Flow::Down);
        if let Some(slot) = self.context.swap(None) {
            slot.0.did_close();
        }
        debug!("closed downlink {:?} {:?}", self.node_uri, self.lane_uri);
        let Some(hub) = self.hub.upgrade() else {
            return Ok(());
        };
        hub.backlog().received_dropped(dropped_up);
        hub.backlog().sent_dropped(dropped_down);
        hub.reconcile_backlog();
        hub.metrics().downlinks.close.increment();
        hub.runtime().close_downlink(self)
    }
}

impl fmt::Debug for RemoteDownlink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDownlink")
            .field("node_uri", &self.node_uri)
            .field("lane_uri", &self.lane_uri)
            .field("remote_node_uri", &self.remote_node_uri)
            .field("state", &self.state)
            .finish()
    }
}
