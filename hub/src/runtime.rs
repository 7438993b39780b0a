use std::sync::Arc;

use meshlink_shared::Envelope;

use crate::{LaneError, RemoteDownlink};

/// The lanes hosted on this side of the connection
pub trait LaneRuntime: Send + Sync {
    /// Binds a downlink to the lane it addresses. The returned context
    /// receives the peer's requests.
    fn open_downlink(
        &self,
        downlink: &Arc<RemoteDownlink>,
    ) -> Result<Arc<dyn LinkContext>, LaneError>;

    fn close_downlink(&self, downlink: &RemoteDownlink) -> Result<(), LaneError>;

    /// A command for a lane the peer never linked to
    fn push_command(&self, envelope: Envelope);

    fn did_connect(&self) {}

    fn did_disconnect(&self) {}

    fn close(&self) -> Result<(), LaneError> {
        Ok(())
    }
}

/// The local end of one link: a subscriber binding for uplinks, a lane
/// binding for downlinks.
pub trait LinkContext: Send + Sync {
    /// There is at least one envelope waiting. The context must answer with
    /// exactly one pull on the link.
    fn feed(&self);

    fn push(&self, envelope: Envelope) -> Result<(), LaneError>;

    fn did_connect(&self) {}

    fn did_disconnect(&self) {}

    fn did_close(&self) {}
}
