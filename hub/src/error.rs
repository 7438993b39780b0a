use thiserror::Error;

use meshlink_shared::{EnvelopeError, EnvelopeKind};

use crate::Flow;

/// Errors raised by the feed/pull/push state machine of a single link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkStateError {
    /// A pull was attempted on a direction that was never fed
    #[error("Pull on the {flow} flow without a preceding feed. Pulls must only follow a feed notification")]
    NotPulling { flow: Flow },

    /// A push or skip arrived after its pull had already been completed or reset
    #[error("Completion on the {flow} flow with no pull outstanding. The pull was already completed, or the link was reset by a disconnect")]
    PullMismatch { flow: Flow },
}

/// Errors reported by a `Transport` implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Attempted to write while no connection is established
    #[error("Transport is not connected")]
    NotConnected,

    /// Connection attempt failed
    #[error("Failed to open connection to {uri}: {reason}")]
    OpenFailed { uri: String, reason: String },

    /// Write of a frame failed
    #[error("Failed to write frame: {reason}")]
    WriteFailed { reason: String },

    /// Shutting the connection down failed
    #[error("Failed to close transport: {reason}")]
    CloseFailed { reason: String },
}

/// Errors reported by the local lane runtime or a local link context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaneError {
    /// No lane is hosted at the requested address
    #[error("No lane {lane_uri} on node {node_uri}")]
    LaneNotFound { node_uri: String, lane_uri: String },

    /// The local context refused an envelope
    #[error("Local link context rejected the envelope: {reason}")]
    Rejected { reason: String },

    /// The local runtime failed while shutting down
    #[error("Local runtime failed to close: {reason}")]
    CloseFailed { reason: String },
}

/// Errors surfaced by operations on a single uplink or downlink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Envelope kind cannot travel in the requested direction of this link
    #[error("The {link} does not carry {kind} envelopes on its {flow} flow")]
    UnsupportedEnvelope {
        link: &'static str,
        flow: Flow,
        kind: EnvelopeKind,
    },

    /// The link was already closed on the side being used
    #[error("Link is closed")]
    Closed,

    /// Another link now serves the same address
    #[error("Another downlink now serves this lane; open a new link instead of reopening")]
    Superseded,

    /// The hub that owns this link has been dropped
    #[error("Owning hub has been dropped; the link can no longer reach its transport")]
    HubDropped,

    /// Link state machine error
    #[error("Link state error: {0}")]
    State(#[from] LinkStateError),

    /// Envelope error
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Lane error
    #[error("Lane error: {0}")]
    Lane(#[from] LaneError),
}

/// General hub-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Operation attempted after the hub started closing
    #[error("Hub is closed")]
    Closed,

    /// Link error
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Lane error
    #[error("Lane error: {0}")]
    Lane(#[from] LaneError),
}
