//! Envelopes addressed to a single lane of a single node.

use crate::{Uri, Value};

macro_rules! lane_message {
    ($(#[$meta:meta])* $name:ident, $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            pub node_uri: Uri,
            pub lane_uri: Uri,
            pub body: Value,
        }

        impl $name {
            pub fn new(node_uri: impl Into<Uri>, lane_uri: impl Into<Uri>, body: Value) -> Self {
                Self {
                    node_uri: node_uri.into(),
                    lane_uri: lane_uri.into(),
                    body,
                }
            }
        }

        envelope_variant!($name, $kind);
    };
}

lane_message!(
    /// A value published by a lane to its subscribers.
    EventMessage,
    Event
);
lane_message!(
    /// A value sent by a subscriber for a lane to act on.
    CommandMessage,
    Command
);
lane_message!(
    /// Confirms that a link request was accepted.
    LinkedResponse,
    Linked
);
lane_message!(
    /// Marks the end of the state a sync request asked for.
    SyncedResponse,
    Synced
);
lane_message!(
    /// Asks a lane to stop sending to this subscriber.
    UnlinkRequest,
    Unlink
);
lane_message!(
    /// Announces that a link has ended, by request or by refusal.
    UnlinkedResponse,
    Unlinked
);
