use std::fmt;

use crate::{EnvelopeError, Uri, Value};

/// Implements the conversions between a message struct and its `Envelope`
/// variant.
macro_rules! envelope_variant {
    ($name:ident, $kind:ident) => {
        impl From<$name> for $crate::Envelope {
            fn from(message: $name) -> Self {
                $crate::Envelope::$kind(message)
            }
        }

        impl TryFrom<$crate::Envelope> for $name {
            type Error = $crate::EnvelopeError;

            fn try_from(envelope: $crate::Envelope) -> Result<Self, Self::Error> {
                match envelope {
                    $crate::Envelope::$kind(message) => Ok(message),
                    other => Err($crate::EnvelopeError::UnexpectedKind {
                        expected: $crate::EnvelopeKind::$kind,
                        found: other.kind(),
                    }),
                }
            }
        }
    };
}

pub mod auth;
pub mod lane;
pub mod link;

use auth::{AuthRequest, AuthedResponse, DeauthRequest, DeauthedResponse};
use lane::{
    CommandMessage, EventMessage, LinkedResponse, SyncedResponse, UnlinkRequest, UnlinkedResponse,
};
use link::{LinkRequest, SyncRequest};

/// One message of the link protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    Event(EventMessage),
    Command(CommandMessage),
    Link(LinkRequest),
    Sync(SyncRequest),
    Linked(LinkedResponse),
    Synced(SyncedResponse),
    Unlink(UnlinkRequest),
    Unlinked(UnlinkedResponse),
    Auth(AuthRequest),
    Authed(AuthedResponse),
    Deauth(DeauthRequest),
    Deauthed(DeauthedResponse),
    /// A kind newer than this build. Hosts pass over these.
    Unrecognized(UnrecognizedEnvelope),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnrecognizedEnvelope {
    pub tag: String,
    pub body: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Event,
    Command,
    Link,
    Sync,
    Linked,
    Synced,
    Unlink,
    Unlinked,
    Auth,
    Authed,
    Deauth,
    Deauthed,
    Unrecognized,
}

impl EnvelopeKind {
    /// The tag the codec writes for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            EnvelopeKind::Event => "event",
            EnvelopeKind::Command => "command",
            EnvelopeKind::Link => "link",
            EnvelopeKind::Sync => "sync",
            EnvelopeKind::Linked => "linked",
            EnvelopeKind::Synced => "synced",
            EnvelopeKind::Unlink => "unlink",
            EnvelopeKind::Unlinked => "unlinked",
            EnvelopeKind::Auth => "auth",
            EnvelopeKind::Authed => "authed",
            EnvelopeKind::Deauth => "deauth",
            EnvelopeKind::Deauthed => "deauthed",
            EnvelopeKind::Unrecognized => "unrecognized",
        }
    }

    /// Requests travel from a subscriber toward a lane.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            EnvelopeKind::Command | EnvelopeKind::Link | EnvelopeKind::Sync | EnvelopeKind::Unlink
        )
    }

    /// Responses travel from a lane back toward its subscribers.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            EnvelopeKind::Event
                | EnvelopeKind::Linked
                | EnvelopeKind::Synced
                | EnvelopeKind::Unlinked
        )
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Event(_) => EnvelopeKind::Event,
            Envelope::Command(_) => EnvelopeKind::Command,
            Envelope::Link(_) => EnvelopeKind::Link,
            Envelope::Sync(_) => EnvelopeKind::Sync,
            Envelope::Linked(_) => EnvelopeKind::Linked,
            Envelope::Synced(_) => EnvelopeKind::Synced,
            Envelope::Unlink(_) => EnvelopeKind::Unlink,
            Envelope::Unlinked(_) => EnvelopeKind::Unlinked,
            Envelope::Auth(_) => EnvelopeKind::Auth,
            Envelope::Authed(_) => EnvelopeKind::Authed,
            Envelope::Deauth(_) => EnvelopeKind::Deauth,
            Envelope::Deauthed(_) => EnvelopeKind::Deauthed,
            Envelope::Unrecognized(_) => EnvelopeKind::Unrecognized,
        }
    }

    /// Returns the node address, for every kind except the auth family.
    pub fn node_uri(&self) -> Option<&Uri> {
        self.address().map(|(node_uri, _)| node_uri)
    }

    pub fn lane_uri(&self) -> Option<&Uri> {
        self.address().map(|(_, lane_uri)| lane_uri)
    }

    pub fn is_lane_addressed(&self) -> bool {
        self.address().is_some()
    }

    pub fn body(&self) -> &Value {
        match self {
            Envelope::Event(message) => &message.body,
            Envelope::Command(message) => &message.body,
            Envelope::Link(request) => &request.body,
            Envelope::Sync(request) => &request.body,
            Envelope::Linked(response) => &response.body,
            Envelope::Synced(response) => &response.body,
            Envelope::Unlink(request) => &request.body,
            Envelope::Unlinked(response) => &response.body,
            Envelope::Auth(request) => &request.body,
            Envelope::Authed(response) => &response.body,
            Envelope::Deauth(request) => &request.body,
            Envelope::Deauthed(response) => &response.body,
            Envelope::Unrecognized(envelope) => &envelope.body,
        }
    }

    /// Returns this envelope addressed to `node_uri`, lane and body untouched.
    pub fn with_node_uri(mut self, node_uri: Uri) -> Result<Envelope, EnvelopeError> {
        match self.node_uri_mut() {
            Some(slot) => {
                *slot = node_uri;
                Ok(self)
            }
            None => Err(EnvelopeError::NotLaneAddressed { kind: self.kind() }),
        }
    }

    fn address(&self) -> Option<(&Uri, &Uri)> {
        match self {
            Envelope::Event(message) => Some((&message.node_uri, &message.lane_uri)),
            Envelope::Command(message) => Some((&message.node_uri, &message.lane_uri)),
            Envelope::Link(request) => Some((&request.node_uri, &request.lane_uri)),
            Envelope::Sync(request) => Some((&request.node_uri, &request.lane_uri)),
            Envelope::Linked(response) => Some((&response.node_uri, &response.lane_uri)),
            Envelope::Synced(response) => Some((&response.node_uri, &response.lane_uri)),
            Envelope::Unlink(request) => Some((&request.node_uri, &request.lane_uri)),
            Envelope::Unlinked(response) => Some((&response.node_uri, &response.lane_uri)),
            Envelope::Auth(_)
            | Envelope::Authed(_)
            | Envelope::Deauth(_)
            | Envelope::Deauthed(_)
            | Envelope::Unrecognized(_) => None,
        }
    }

    fn node_uri_mut(&mut self) -> Option<&mut Uri> {
        match self {
            Envelope::Event(message) => Some(&mut message.node_uri),
            Envelope::Command(message) => Some(&mut message.node_uri),
            Envelope::Link(request) => Some(&mut request.node_uri),
            Envelope::Sync(request) => Some(&mut request.node_uri),
            Envelope::Linked(response) => Some(&mut response.node_uri),
            Envelope::Synced(response) => Some(&mut response.node_uri),
            Envelope::Unlink(request) => Some(&mut request.node_uri),
            Envelope::Unlinked(response) => Some(&mut response.node_uri),
            Envelope::Auth(_)
            | Envelope::Authed(_)
            | Envelope::Deauth(_)
            | Envelope::Deauthed(_)
            | Envelope::Unrecognized(_) => None,
        }
    }
}

impl From<UnrecognizedEnvelope> for Envelope {
    fn from(envelope: UnrecognizedEnvelope) -> Self {
        Envelope::Unrecognized(envelope)
    }
}
