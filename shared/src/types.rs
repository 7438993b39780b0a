/// Which end of the transport connection a host sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    /// Accepted an inbound connection; the connection is gone once it drops.
    Server,
    /// Initiated the connection, and re-establishes it after a disconnect.
    Client,
}

impl HostType {
    pub fn reconnects(self) -> bool {
        match self {
            HostType::Server => false,
            HostType::Client => true,
        }
    }
}
