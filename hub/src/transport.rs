use std::net::SocketAddr;

use url::Url;

use meshlink_shared::Envelope;

use crate::{PullRequest, TransportError};

/// The connection a hub multiplexes its links over. Implementations own the
/// socket and the codec; the hub only sees typed envelopes.
pub trait Transport: Send + Sync {
    /// Starts a connection attempt toward `uri`. Completion is reported
    /// back through `RemoteLinkHub::did_connect` or `did_fail`.
    fn open(&self, uri: &Url) -> Result<(), TransportError>;

    /// A link has an envelope for the peer. The transport must call
    /// `request.pull()` exactly once, when it is ready to write.
    fn feed(&self, request: PullRequest);

    fn write(&self, frame: Frame) -> Result<(), TransportError>;

    fn remote_address(&self) -> Option<SocketAddr>;

    fn is_secure(&self) -> bool;

    fn flow_control(&self, flow_control: FlowControl);

    fn close(&self) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Envelope(Envelope),
    Close(CloseFrame),
}

impl From<Envelope> for Frame {
    fn from(envelope: Envelope) -> Self {
        Frame::Envelope(envelope)
    }
}

/// Protocol-level close sent ahead of tearing a connection down
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub const POLICY_VIOLATION: u16 = 1008;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(Self::POLICY_VIOLATION, "Unauthorized")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowControl {
    EnableRead,
    DisableRead,
}
