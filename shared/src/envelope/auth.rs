//! Connection-level authentication envelopes. None of these are addressed to
//! a lane.

use crate::Value;

macro_rules! auth_message {
    ($(#[$meta:meta])* $name:ident, $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Default)]
        pub struct $name {
            pub body: Value,
        }

        impl $name {
            pub fn new(body: Value) -> Self {
                Self { body }
            }
        }

        envelope_variant!($name, $kind);
    };
}

auth_message!(
    /// Presents credentials to the peer.
    AuthRequest,
    Auth
);
auth_message!(
    /// Accepts credentials; the body carries the authenticated subject.
    AuthedResponse,
    Authed
);
auth_message!(
    /// Drops whatever identity was established on this connection.
    DeauthRequest,
    Deauth
);
auth_message!(
    /// Reports that the connection is not (or no longer) authenticated.
    DeauthedResponse,
    Deauthed
);
