//! # Meshlink Shared
//! Envelope model and addressing types shared by every meshlink host.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod envelope;
mod error;
mod link_key;
mod types;
mod uri;
mod value;

pub use envelope::{
    auth::{AuthRequest, AuthedResponse, DeauthRequest, DeauthedResponse},
    lane::{
        CommandMessage, EventMessage, LinkedResponse, SyncedResponse, UnlinkRequest,
        UnlinkedResponse,
    },
    link::{LinkRequest, SyncRequest},
    Envelope, EnvelopeKind, UnrecognizedEnvelope,
};
pub use error::EnvelopeError;
pub use link_key::{LinkKey, LinkKeyGenerator};
pub use types::HostType;
pub use uri::Uri;
pub use value::Value;
