//! Subscription requests. These additionally carry the subscriber's
//! scheduling hints.

use crate::{Uri, Value};

macro_rules! link_request {
    ($(#[$meta:meta])* $name:ident, $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            pub node_uri: Uri,
            pub lane_uri: Uri,
            pub prio: f32,
            pub rate: f32,
            pub body: Value,
        }

        impl $name {
            pub fn new(node_uri: impl Into<Uri>, lane_uri: impl Into<Uri>) -> Self {
                Self::with_params(node_uri, lane_uri, 0.0, 0.0, Value::Absent)
            }

            pub fn with_params(
                node_uri: impl Into<Uri>,
                lane_uri: impl Into<Uri>,
                prio: f32,
                rate: f32,
                body: Value,
            ) -> Self {
                Self {
                    node_uri: node_uri.into(),
                    lane_uri: lane_uri.into(),
                    prio,
                    rate,
                    body,
                }
            }
        }

        envelope_variant!($name, $kind);
    };
}

link_request!(
    /// Subscribes to the future events of a lane.
    LinkRequest,
    Link
);
link_request!(
    /// Subscribes to a lane, asking first for its current state.
    SyncRequest,
    Sync
);
