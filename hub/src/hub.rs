use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{Arc, Weak},
    time::Instant,
};

use arc_swap::ArcSwap;
use log::{debug, info, trace, warn};
use url::Url;

use meshlink_shared::{
    AuthRequest, AuthedResponse, DeauthedResponse, Envelope, HostType, LinkKeyGenerator,
    UnlinkRequest, UnlinkedResponse, Uri, Value,
};

use crate::{
    backlog::Backlog,
    connection::connection_state::AtomicConnectionState,
    registry::{DownlinkRegistry, UplinkRegistry},
    Admission, AuthGate, Authentication, Authenticator, ClockScheduler, CloseFrame,
    ConnectionState, Frame, HostMetrics, HostProfile, HubConfig, HubError, Identity, LaneError,
    LaneRuntime, LinkError, LinkContext, MetricsSink, PolicyGate, PullRequest, ReconnectBackoff,
    RemoteDownlink, RemoteUplink, Transport, TransportError, UriResolver,
};

/// Multiplexes every link between this host and one peer over a single
/// transport connection.
///
/// Inbound envelopes enter through `did_read` and are routed to the links
/// they address. Links queue their outbound envelopes and feed the
/// transport, which pulls them one at a time.
pub struct RemoteLinkHub {
    me: Weak<RemoteLinkHub>,
    host_type: HostType,
    host_uri: Url,
    /// `host_uri` with the negotiated peer address; the resolver's base
    remote_uri: ArcSwap<Url>,
    config: HubConfig,
    transport: Arc<dyn Transport>,
    runtime: Arc<dyn LaneRuntime>,
    scheduler: Option<Arc<dyn ClockScheduler>>,
    metrics_sink: Option<Arc<dyn MetricsSink>>,
    auth: AuthGate,
    state: AtomicConnectionState,
    backoff: ReconnectBackoff,
    resolver: UriResolver,
    downlinks: DownlinkRegistry,
    uplinks: UplinkRegistry,
    link_keys: LinkKeyGenerator,
    backlog: Backlog,
    metrics: HostMetrics,
}

impl RemoteLinkHub {
    pub fn builder(
        host_type: HostType,
        host_uri: Url,
        transport: Arc<dyn Transport>,
        runtime: Arc<dyn LaneRuntime>,
    ) -> HubBuilder {
        HubBuilder::new(host_type, host_uri, transport, runtime)
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn host_uri(&self) -> &Url {
        &self.host_uri
    }

    pub fn remote_uri(&self) -> Arc<Url> {
        self.remote_uri.load_full()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.load()
    }

    pub fn is_connected(&self) -> bool {
        self.state.load() == ConnectionState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state.load().is_closing()
    }

    /// The peer as seen by this host
    pub fn identity(&self) -> Arc<Identity> {
        self.auth.identity()
    }

    /// Whether the peer accepted the credentials sent by `authenticate`
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated_remotely()
    }

    /// Resolves a node URI the peer sent against this connection.
    pub fn resolve(&self, node_uri: &Uri) -> Uri {
        self.resolver.resolve(&self.remote_uri(), node_uri)
    }

    /// Converts a local node URI to the form the peer knows it by. The
    /// configured host and the negotiated peer address both name the peer.
    pub fn unresolve(&self, node_uri: &Uri) -> Uri {
        let unresolved = self.resolver.unresolve(&self.host_uri, node_uri);
        if &unresolved != node_uri {
            return unresolved;
        }
        self.resolver.unresolve(&self.remote_uri(), node_uri)
    }

    pub fn downlink(&self, node_uri: &Uri, lane_uri: &Uri) -> Option<Arc<RemoteDownlink>> {
        self.downlinks.get(node_uri, lane_uri)
    }

    pub fn uplinks(&self, node_uri: &Uri, lane_uri: &Uri) -> Vec<Arc<RemoteUplink>> {
        self.uplinks.get(node_uri, lane_uri)
    }

    pub fn downlink_count(&self) -> usize {
        self.downlinks.len()
    }

    pub fn uplink_count(&self) -> usize {
        self.uplinks.len()
    }

    pub fn send_backlog(&self) -> usize {
        self.backlog.send_len()
    }

    pub fn receive_backlog(&self) -> usize {
        self.backlog.receive_len()
    }

    // Local Subscribers

    /// Links a local subscriber to a lane on the peer. Nothing is sent until
    /// the subscriber queues a request on the returned uplink.
    pub fn open_uplink(
        &self,
        node_uri: impl Into<Uri>,
        lane_uri: impl Into<Uri>,
        binding: Arc<dyn LinkContext>,
    ) -> Result<Arc<RemoteUplink>, HubError> {
        if self.is_closed() {
            return Err(HubError::Closed);
        }
        let remote_node_uri = self.unresolve(&node_uri.into());
        let node_uri = self.resolve(&remote_node_uri);
        let uplink = RemoteUplink::new(
            self.me.clone(),
            binding,
            node_uri,
            lane_uri.into(),
            remote_node_uri,
            self.link_keys.generate(),
        );
        self.uplinks.insert(&uplink);
        self.metrics.uplinks.open.increment();
        debug!(
            "opened uplink {} to {:?} {:?}",
            uplink.link_key(),
            uplink.node_uri(),
            uplink.lane_uri()
        );
        if self.is_connected() {
            uplink.did_connect();
        }
        Ok(uplink)
    }

    /// Presents this host's credentials to the peer.
    pub fn authenticate(&self, credentials: Value) -> Result<(), HubError> {
        self.write_envelope(AuthRequest::new(credentials).into())?;
        Ok(())
    }

    // Inbound

    /// Routes one envelope received from the peer.
    pub fn did_read(&self, envelope: Envelope) -> Result<(), HubError> {
        if self.is_closed() {
            trace!("dropping {} envelope read after close", envelope.kind());
            return Err(HubError::Closed);
        }
        self.metrics.reads.increment();
        trace!("read {} envelope", envelope.kind());
        match envelope {
            Envelope::Event(_) | Envelope::Linked(_) | Envelope::Synced(_) => {
                self.on_response(envelope)
            }
            Envelope::Unlinked(_) => self.on_unlinked(envelope),
            Envelope::Command(_) => self.on_command(envelope),
            Envelope::Link(_) | Envelope::Sync(_) => self.on_link(envelope),
            Envelope::Unlink(_) => self.on_unlink(envelope),
            Envelope::Auth(request) => self.on_auth(&request.body),
            Envelope::Deauth(_) => {
                self.auth.deauthenticate();
                self.write_envelope(DeauthedResponse::default().into())?;
                Ok(())
            }
            Envelope::Authed(_) => {
                info!("peer accepted our credentials");
                self.auth.set_authenticated_remotely(true);
                Ok(())
            }
            Envelope::Deauthed(_) => {
                debug!("peer deauthenticated this host");
                self.auth.set_authenticated_remotely(false);
                Ok(())
            }
            Envelope::Unrecognized(unrecognized) => {
                trace!("ignoring unrecognized envelope {:?}", unrecognized.tag);
                Ok(())
            }
        }
    }

    fn on_response(&self, envelope: Envelope) -> Result<(), HubError> {
        let Some((node_uri, lane_uri)) = self.address_of(&envelope) else {
            return Ok(());
        };
        let uplinks = self.uplinks.get(&node_uri, &lane_uri);
        if uplinks.is_empty() {
            trace!("no uplinks for {:?} {:?}", node_uri, lane_uri);
            return Ok(());
        }
        self.fan_out(&uplinks, envelope, &node_uri)
    }

    fn on_unlinked(&self, envelope: Envelope) -> Result<(), HubError> {
        let Some((node_uri, lane_uri)) = self.address_of(&envelope) else {
            return Ok(());
        };
        let uplinks = self.uplinks.remove_lane(&node_uri, &lane_uri);
        if uplinks.is_empty() {
            trace!("unlinked from {:?} {:?} with no uplinks", node_uri, lane_uri);
            return Ok(());
        }
        debug!("peer unlinked {} uplinks of {:?} {:?}", uplinks.len(), node_uri, lane_uri);
        self.fan_out(&uplinks, envelope, &node_uri)
    }

    fn fan_out(
        &self,
        uplinks: &[Arc<RemoteUplink>],
        envelope: Envelope,
        node_uri: &Uri,
    ) -> Result<(), HubError> {
        let envelope = envelope.with_node_uri(node_uri.clone()).map_err(LinkError::from)?;
        for uplink in uplinks {
            if let Err(error) = uplink.queue_down(envelope.clone()) {
                debug!("skipping uplink {}: {}", uplink.link_key(), error);
            }
        }
        Ok(())
    }

    fn on_command(&self, envelope: Envelope) -> Result<(), HubError> {
        let Some(envelope) = self.admit(envelope)? else {
            return Ok(());
        };
        let Some((node_uri, lane_uri)) = self.address_of(&envelope) else {
            return Ok(());
        };
        let envelope = envelope.with_node_uri(node_uri.clone()).map_err(LinkError::from)?;
        match self.downlinks.get(&node_uri, &lane_uri) {
            Some(downlink) => downlink.queue_up(envelope)?,
            None => {
                self.metrics.downlinks.command.increment();
                self.runtime.push_command(envelope);
            }
        }
        Ok(())
    }

    fn on_link(&self, envelope: Envelope) -> Result<(), HubError> {
        let Some(envelope) = self.admit(envelope)? else {
            return Ok(());
        };
        let Some((node_uri, lane_uri)) = self.address_of(&envelope) else {
            return Ok(());
        };
        let remote_node_uri = envelope.node_uri().cloned().unwrap_or_default();
        let opened = self.open_downlink(
            &envelope,
            remote_node_uri.clone(),
            node_uri.clone(),
            lane_uri.clone(),
        );
        let downlink = match opened {
            Ok(downlink) => downlink,
            Err(error) => {
                warn!("failed to open downlink {:?} {:?}: {}", node_uri, lane_uri, error);
                if self.is_connected() {
                    self.write_envelope(
                        UnlinkedResponse::new(remote_node_uri, lane_uri, Value::text("not found"))
                            .into(),
                    )?;
                }
                return Err(error.into());
            }
        };
        let envelope = envelope.with_node_uri(node_uri).map_err(LinkError::from)?;
        downlink.queue_up(envelope)?;
        Ok(())
    }

    /// Returns the downlink registered for the address, creating and binding
    /// one if there is none. Of two racing creations the first to register
    /// wins; the loser's lane context is released.
    fn open_downlink(
        &self,
        request: &Envelope,
        remote_node_uri: Uri,
        node_uri: Uri,
        lane_uri: Uri,
    ) -> Result<Arc<RemoteDownlink>, LaneError> {
        if let Some(existing) = self.downlinks.get(&node_uri, &lane_uri) {
            return Ok(existing);
        }
        let (prio, rate) = match request {
            Envelope::Link(request) => (request.prio, request.rate),
            Envelope::Sync(request) => (request.prio, request.rate),
            _ => (0.0, 0.0),
        };
        let candidate = RemoteDownlink::new(
            self.me.clone(),
            remote_node_uri,
            node_uri,
            lane_uri,
            prio,
            rate,
            request.body().clone(),
        );
        let context = self.runtime.open_downlink(&candidate)?;
        let winner = self.downlinks.insert_if_absent(&candidate);
        if Arc::ptr_eq(&winner, &candidate) {
            candidate.attach(context);
            self.metrics.downlinks.open.increment();
            debug!("opened downlink {:?} {:?}", candidate.node_uri(), candidate.lane_uri());
            if self.is_connected() {
                candidate.did_connect();
            }
        } else {
            trace!("lost downlink race for {:?} {:?}", candidate.node_uri(), candidate.lane_uri());
            context.did_close();
            if let Err(error) = self.runtime.close_downlink(&candidate) {
                warn!("failed to release losing downlink: {}", error);
            }
        }
        Ok(winner)
    }

    fn on_unlink(&self, envelope: Envelope) -> Result<(), HubError> {
        let Some((node_uri, lane_uri)) = self.address_of(&envelope) else {
            return Ok(());
        };
        let Some(downlink) = self.downlinks.remove(&node_uri, &lane_uri) else {
            trace!("unlink for {:?} {:?} with no downlink", node_uri, lane_uri);
            return Ok(());
        };
        debug!("peer unlinked downlink {:?} {:?}", node_uri, lane_uri);
        if self.is_connected() {
            self.write_envelope(
                UnlinkedResponse::new(downlink.remote_node_uri().clone(), lane_uri, Value::Absent)
                    .into(),
            )?;
        }
        downlink.close_down()?;
        Ok(())
    }

    fn on_auth(&self, credentials: &Value) -> Result<(), HubError> {
        match self.auth.authenticate(credentials) {
            Authentication::Authenticated(subject) => {
                self.write_envelope(AuthedResponse::new(subject).into())?;
                Ok(())
            }
            Authentication::Unauthenticated => {
                self.write_envelope(DeauthedResponse::default().into())?;
                Ok(())
            }
            Authentication::Forbidden(_) => {
                self.write_envelope(DeauthedResponse::default().into())?;
                self.forbid()
            }
        }
    }

    /// `None` if the request was refused and answered.
    fn admit(&self, envelope: Envelope) -> Result<Option<Envelope>, HubError> {
        match self.auth.admit(envelope) {
            Admission::Admit(envelope) => Ok(Some(envelope)),
            Admission::Deny(response) => {
                if self.is_connected() {
                    self.write_envelope(response)?;
                }
                Ok(None)
            }
            Admission::Forbid => {
                self.forbid()?;
                Ok(None)
            }
        }
    }

    fn forbid(&self) -> Result<(), HubError> {
        warn!("closing connection to {}: unauthorized", self.remote_uri());
        if let Err(error) = self.transport.write(Frame::Close(CloseFrame::unauthorized())) {
            warn!("failed to send close frame: {}", error);
        }
        self.close()
    }

    fn address_of(&self, envelope: &Envelope) -> Option<(Uri, Uri)> {
        let node_uri = envelope.node_uri()?;
        let lane_uri = envelope.lane_uri()?;
        Some((self.resolve(node_uri), lane_uri.clone()))
    }

    // Links

    /// Hands a link's pull to the transport, or parks it until the next
    /// connect.
    pub(crate) fn feed(&self, request: PullRequest) {
        let flow = request.flow();
        loop {
            if self.is_connected() {
                self.transport.feed(request);
                return;
            }
            let state = request.state();
            state.park(flow);
            // `did_connect` re-feeds parked links; recheck in case it already ran
            if !self.is_connected() || state.is_empty(flow) || !state.feed(flow) {
                return;
            }
        }
    }

    pub(crate) fn write_envelope(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.transport.write(Frame::Envelope(envelope))?;
        self.metrics.writes.increment();
        Ok(())
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn LaneRuntime> {
        &self.runtime
    }

    pub(crate) fn backlog(&self) -> &Backlog {
        &self.backlog
    }

    pub(crate) fn metrics(&self) -> &HostMetrics {
        &self.metrics
    }

    pub(crate) fn reconcile_backlog(&self) {
        self.backlog
            .reconcile(|flow_control| self.transport.flow_control(flow_control));
    }

    /// Registers `downlink` unless another one already serves its address.
    pub(crate) fn register_downlink(&self, downlink: &Arc<RemoteDownlink>) -> bool {
        Arc::ptr_eq(&self.downlinks.insert_if_absent(downlink), downlink)
    }

    pub(crate) fn close_uplink(&self, uplink: &RemoteUplink) {
        let removed = self
            .uplinks
            .remove(uplink.node_uri(), uplink.lane_uri(), uplink.link_key());
        if removed == Some(true) && self.is_connected() {
            debug!("last uplink of {:?} {:?} closed", uplink.node_uri(), uplink.lane_uri());
            let unlink = UnlinkRequest::new(
                uplink.remote_node_uri().clone(),
                uplink.lane_uri().clone(),
                Value::Absent,
            );
            if let Err(error) = self.write_envelope(unlink.into()) {
                warn!("failed to unlink {:?}: {}", uplink.lane_uri(), error);
            }
        }
        uplink.close_down();
    }

    pub(crate) fn close_downlink(&self, downlink: &RemoteDownlink) {
        if self.downlinks.remove_if(downlink) && self.is_connected() {
            let unlinked = UnlinkedResponse::new(
                downlink.remote_node_uri().clone(),
                downlink.lane_uri().clone(),
                Value::Absent,
            );
            if let Err(error) = self.write_envelope(unlinked.into()) {
                warn!("failed to report unlink of {:?}: {}", downlink.lane_uri(), error);
            }
        }
        if let Err(error) = downlink.close_down() {
            warn!("failed to close downlink {:?}: {}", downlink.lane_uri(), error);
        }
    }

    // Connection

    /// Starts connecting to `host_uri`. A no-op unless disconnected.
    pub fn open(&self) -> Result<(), HubError> {
        match self
            .state
            .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            Ok(()) => {}
            Err(state) if state.is_closing() => return Err(HubError::Closed),
            Err(state) => {
                trace!("open while {:?}", state);
                return Ok(());
            }
        }
        info!("connecting to {}", self.host_uri);
        if let Err(error) = self.transport.open(&self.host_uri) {
            warn!("failed to connect to {}: {}", self.host_uri, error);
            match self
                .state
                .transition(ConnectionState::Connecting, ConnectionState::Disconnected)
            {
                Ok(()) if self.host_type.reconnects() => self.schedule_reconnect(),
                Ok(()) => {}
                Err(state) => trace!("not reconnecting to {} while {:?}", self.host_uri, state),
            }
            return Err(error.into());
        }
        Ok(())
    }

    /// Called by the embedder when the reconnect timer fires.
    pub fn reconnect(&self) -> Result<(), HubError> {
        debug!("reconnecting to {}", self.host_uri);
        self.open()
    }

    pub fn did_connect(&self) {
        if let Err(state) = self.state.advance(ConnectionState::Connected) {
            debug!("ignoring connect while {:?}", state);
            return;
        }
        let remote_address = self.transport.remote_address();
        self.remote_uri
            .store(Arc::new(remote_uri_of(&self.host_uri, remote_address)));
        self.resolver.clear();
        self.auth
            .connected(remote_address, self.transport.is_secure());
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel_reconnect();
        }
        self.backoff.reset();
        info!("connected to {}", self.remote_uri());

        self.runtime.did_connect();
        for uplink in self.uplinks.all() {
            uplink.did_connect();
        }
        for downlink in self.downlinks.all() {
            downlink.did_connect();
        }
        self.reconcile_backlog();
    }

    pub fn did_disconnect(&self) {
        let closing = self.state.advance(ConnectionState::Disconnected).is_err();
        info!("disconnected from {}", self.remote_uri());
        self.backlog.clear_receive();
        for uplink in self.uplinks.all() {
            uplink.did_disconnect();
        }
        for downlink in self.downlinks.all() {
            downlink.did_disconnect();
        }
        self.runtime.did_disconnect();
        self.auth.disconnected();
        self.reconcile_backlog();
        if closing {
            return;
        }
        if self.host_type.reconnects() {
            self.schedule_reconnect();
        } else if let Err(error) = self.close() {
            warn!("error closing hub after disconnect: {}", error);
        }
    }

    pub fn did_fail(&self, error: TransportError) {
        warn!("transport to {} failed: {}", self.remote_uri(), error);
        self.did_disconnect();
    }

    fn schedule_reconnect(&self) {
        let delay = self.backoff.next_timeout();
        match &self.scheduler {
            Some(scheduler) => {
                info!("reconnecting to {} in {:?}", self.host_uri, delay);
                scheduler.schedule_reconnect(delay);
            }
            None => debug!("no scheduler; not reconnecting to {}", self.host_uri),
        }
    }

    /// Closes every downlink, every uplink, the lane runtime and the
    /// transport, in that order. Every step runs; the first failure is
    /// returned. Calls after the first return `Ok`.
    pub fn close(&self) -> Result<(), HubError> {
        if !self.state.begin_close() {
            return Ok(());
        }
        info!("closing hub for {}", self.host_uri);
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel_reconnect();
        }
        let mut first_error: Option<HubError> = None;

        for downlink in self.downlinks.take_all() {
            if let Err(error) = downlink.close_down() {
                warn!("failed to close downlink {:?}: {}", downlink.lane_uri(), error);
                record(&mut first_error, error.into());
            }
        }
        for uplink in self.uplinks.take_all() {
            uplink.close_down();
        }
        if let Err(error) = self.runtime.close() {
            warn!("failed to close lane runtime: {}", error);
            record(&mut first_error, error.into());
        }
        if let Err(error) = self.transport.close() {
            warn!("failed to close transport: {}", error);
            record(&mut first_error, error.into());
        }

        self.state.store(ConnectionState::Closed);
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    // Metrics

    /// Hands a profile to the metrics sink if a report interval has passed.
    pub fn flush_metrics(&self, now: Instant) -> Option<HostProfile> {
        let profile = self.metrics.report_if_due(now, self.node_count())?;
        if let Some(sink) = &self.metrics_sink {
            sink.report(profile);
        }
        Some(profile)
    }

    fn node_count(&self) -> usize {
        let mut nodes: HashSet<Uri> = self.downlinks.node_uris().into_iter().collect();
        nodes.extend(self.uplinks.node_uris());
        nodes.len()
    }
}

fn record(first_error: &mut Option<HubError>, error: HubError) {
    if first_error.is_none() {
        *first_error = Some(error);
    }
}

fn remote_uri_of(host_uri: &Url, remote_address: Option<SocketAddr>) -> Url {
    let mut remote_uri = host_uri.clone();
    if let Some(address) = remote_address {
        if remote_uri.set_ip_host(address.ip()).is_err()
            || remote_uri.set_port(Some(address.port())).is_err()
        {
            warn!("cannot address {} at {}", host_uri, address);
            return host_uri.clone();
        }
    }
    remote_uri
}

// HubBuilder

/// Assembles a `RemoteLinkHub`. Policy, authenticator, scheduler and metrics
/// sink are optional.
pub struct HubBuilder {
    host_type: HostType,
    host_uri: Url,
    transport: Arc<dyn Transport>,
    runtime: Arc<dyn LaneRuntime>,
    policy: Option<Arc<dyn PolicyGate>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    scheduler: Option<Arc<dyn ClockScheduler>>,
    metrics_sink: Option<Arc<dyn MetricsSink>>,
    config: HubConfig,
}

impl HubBuilder {
    pub fn new(
        host_type: HostType,
        host_uri: Url,
        transport: Arc<dyn Transport>,
        runtime: Arc<dyn LaneRuntime>,
    ) -> Self {
        Self {
            host_type,
            host_uri,
            transport,
            runtime,
            policy: None,
            authenticator: None,
            scheduler: None,
            metrics_sink: None,
            config: HubConfig::default(),
        }
    }

    pub fn policy(mut self, policy: Arc<dyn PolicyGate>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn ClockScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn metrics_sink(mut self, metrics_sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics_sink = Some(metrics_sink);
        self
    }

    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<RemoteLinkHub> {
        let config = self.config;
        Arc::new_cyclic(|me| RemoteLinkHub {
            me: me.clone(),
            host_type: self.host_type,
            remote_uri: ArcSwap::from_pointee(self.host_uri.clone()),
            host_uri: self.host_uri,
            transport: self.transport,
            runtime: self.runtime,
            scheduler: self.scheduler,
            metrics_sink: self.metrics_sink,
            auth: AuthGate::new(self.policy, self.authenticator),
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            backoff: ReconnectBackoff::new(config.reconnect.clone()),
            resolver: UriResolver::new(config.resolver_cache_size),
            downlinks: DownlinkRegistry::new(),
            uplinks: UplinkRegistry::new(),
            link_keys: LinkKeyGenerator::new(),
            backlog: Backlog::new(config.max_send_backlog, config.max_receive_backlog),
            metrics: HostMetrics::new(config.metrics_report_interval),
            config,
        })
    }
}
