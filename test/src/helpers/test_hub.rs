use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use url::Url;

use meshlink_hub::{
    shared::{Envelope, HostType},
    HubBuilder, RemoteDownlink, RemoteLinkHub, RemoteUplink,
};

use crate::{
    RecordingContext, RecordingRuntime, RecordingScheduler, RecordingSink, RecordingTransport,
};

pub const HOST_URI: &str = "warp://peer.example:9001/";
pub const REMOTE_ADDRESS: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 9001);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A hub wired to recording collaborators
pub struct TestHub {
    pub hub: Arc<RemoteLinkHub>,
    pub transport: Arc<RecordingTransport>,
    pub runtime: Arc<RecordingRuntime>,
    pub scheduler: Arc<RecordingScheduler>,
    pub sink: Arc<RecordingSink>,
}

impl TestHub {
    pub fn client() -> Self {
        Self::with(HostType::Client, |builder| builder)
    }

    pub fn server() -> Self {
        Self::with(HostType::Server, |builder| builder)
    }

    /// A client hub that has completed its handshake
    pub fn connected() -> Self {
        let test_hub = Self::client();
        test_hub.connect();
        test_hub
    }

    pub fn with(host_type: HostType, configure: impl FnOnce(HubBuilder) -> HubBuilder) -> Self {
        init_logging();
        let transport = RecordingTransport::new(Some(REMOTE_ADDRESS));
        let runtime = RecordingRuntime::new();
        let scheduler = RecordingScheduler::new();
        let sink = RecordingSink::new();
        let builder = RemoteLinkHub::builder(
            host_type,
            Url::parse(HOST_URI).unwrap(),
            transport.clone(),
            runtime.clone(),
        )
        .scheduler(scheduler.clone())
        .metrics_sink(sink.clone());
        let hub = configure(builder).build();
        Self {
            hub,
            transport,
            runtime,
            scheduler,
            sink,
        }
    }

    pub fn connect(&self) {
        self.hub.open().unwrap();
        self.hub.did_connect();
    }

    /// Feeds one envelope from the peer, panicking on error.
    pub fn read(&self, envelope: impl Into<Envelope>) {
        self.hub.did_read(envelope.into()).unwrap();
    }

    /// Pulls every pending feed and returns what reached the peer.
    pub fn flush(&self) -> Vec<Envelope> {
        self.transport.drain();
        self.transport.take_envelopes()
    }

    pub fn open_uplink(
        &self,
        node_uri: &str,
        lane_uri: &str,
    ) -> (Arc<RemoteUplink>, Arc<RecordingContext>) {
        let binding = RecordingContext::new();
        let uplink = self
            .hub
            .open_uplink(node_uri, lane_uri, binding.clone())
            .unwrap();
        (uplink, binding)
    }
}

/// Answers every pending feed of `binding` with a pull on `uplink`.
pub fn pump_uplink(uplink: &RemoteUplink, binding: &RecordingContext) -> usize {
    let mut delivered = 0;
    while binding.take_feed() {
        if uplink.pull_down().is_delivered() {
            delivered += 1;
        }
    }
    delivered
}

/// Answers every pending feed of `context` with a pull on `downlink`.
pub fn pump_downlink(downlink: &RemoteDownlink, context: &RecordingContext) -> usize {
    let mut delivered = 0;
    while context.take_feed() {
        if downlink.pull_up().is_delivered() {
            delivered += 1;
        }
    }
    delivered
}
