use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the transport connection a hub runs over.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`, repeating for
/// client hubs, until `close` moves any state through `Closing` to `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closing,
            4 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Whether `close` has been called
    pub fn is_closing(&self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }
}

pub struct AtomicConnectionState {
    state: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`; fails with the actual state otherwise.
    pub fn transition(
        &self,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), ConnectionState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ConnectionState::from_u8)
    }

    /// Moves to `to` unless the hub is closing. Returns the previous state.
    pub fn advance(&self, to: ConnectionState) -> Result<ConnectionState, ConnectionState> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if ConnectionState::from_u8(current).is_closing() {
                    None
                } else {
                    Some(to as u8)
                }
            })
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    /// Moves to `Closing` exactly once. Returns `false` if already closing.
    pub fn begin_close(&self) -> bool {
        self.advance(ConnectionState::Closing).is_ok()
    }

    pub fn store(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
