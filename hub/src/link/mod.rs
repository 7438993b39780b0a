use std::{fmt, sync::Arc};

pub mod downlink;
pub mod link_state;
pub mod uplink;

use downlink::RemoteDownlink;
use link_state::{Flow, LinkState};
use uplink::RemoteUplink;

use crate::LinkError;

/// How one pull was completed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PullOutcome {
    /// One envelope crossed the link
    Delivered,
    /// The queue was empty by the time the pull ran
    Skipped,
    /// The envelope could not be delivered; the link handled the failure
    Failed(LinkError),
}

impl PullOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PullOutcome::Delivered)
    }
}

/// Handed to `Transport::feed` when a link has an envelope for the peer.
/// The transport calls `pull` exactly once, when it is ready to write.
#[derive(Clone)]
pub enum PullRequest {
    Uplink(Arc<RemoteUplink>),
    Downlink(Arc<RemoteDownlink>),
}

impl PullRequest {
    pub fn pull(self) -> PullOutcome {
        match self {
            PullRequest::Uplink(uplink) => uplink.pull_up(),
            PullRequest::Downlink(downlink) => downlink.pull_down(),
        }
    }

    /// The direction this request drains: toward the peer's lane for
    /// uplinks, toward the peer's subscriber for downlinks.
    pub fn flow(&self) -> Flow {
        match self {
            PullRequest::Uplink(_) => Flow::Up,
            PullRequest::Downlink(_) => Flow::Down,
        }
    }

    pub fn state(&self) -> &LinkState {
        match self {
            PullRequest::Uplink(uplink) => uplink.state(),
            PullRequest::Downlink(downlink) => downlink.state(),
        }
    }
}

impl fmt::Debug for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequest::Uplink(uplink) => f
                .debug_tuple("Uplink")
                .field(uplink.node_uri())
                .field(uplink.lane_uri())
                .finish(),
            PullRequest::Downlink(downlink) => f
                .debug_tuple("Downlink")
                .field(downlink.node_uri())
                .field(downlink.lane_uri())
                .finish(),
        }
    }
}
