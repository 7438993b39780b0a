//! # Meshlink Hub
//! The per-connection multiplexer that carries many independent lane
//! subscriptions, in both directions, over a single transport connection.
//! Every link keeps its own backpressure state in one atomic word; the link
//! registries are swapped whole under compare-and-swap, so no lock sits on
//! the path of an envelope.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod shared {
    pub use meshlink_shared::{
        AuthRequest, AuthedResponse, CommandMessage, DeauthRequest, DeauthedResponse, Envelope,
        EnvelopeError, EnvelopeKind, EventMessage, HostType, LinkKey, LinkRequest,
        LinkedResponse, SyncRequest, SyncedResponse, UnlinkRequest, UnlinkedResponse,
        UnrecognizedEnvelope, Uri, Value,
    };
}

mod auth_gate;
mod backlog;
mod config;
mod connection;
mod error;
mod hub;
mod link;
mod metrics;
mod registry;
mod resolver;
mod runtime;
mod transport;

pub use auth_gate::{Admission, AuthGate, Authentication, Authenticator, Identity, PolicyDirective, PolicyGate};
pub use backlog::Backlog;
pub use config::{HubConfig, ReconnectConfig};
pub use connection::{
    backoff::ReconnectBackoff,
    connection_state::ConnectionState,
    reconnect_timer::{ClockScheduler, ReconnectTimer},
};
pub use error::{HubError, LaneError, LinkError, LinkStateError, TransportError};
pub use hub::{HubBuilder, RemoteLinkHub};
pub use link::{
    downlink::RemoteDownlink,
    link_state::{Flow, LinkState},
    uplink::RemoteUplink,
    PullOutcome, PullRequest,
};
pub use metrics::{AgentPulse, HostMetrics, HostProfile, LinkPulse, MetricsSink};
pub use resolver::UriResolver;
pub use runtime::{LaneRuntime, LinkContext};
pub use transport::{CloseFrame, FlowControl, Frame, Transport};
