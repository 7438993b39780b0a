use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use log::{debug, info, warn};

use meshlink_shared::{
    CommandMessage, Envelope, LinkRequest, SyncRequest, UnlinkedResponse, Value,
};

/// Who is on the other end of the connection, as far as this host knows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Identity {
    /// Set once the peer authenticates
    pub subject: Option<Value>,
    pub remote_address: Option<SocketAddr>,
    pub secure: bool,
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }
}

/// A policy verdict. `Allow` may carry a rewritten message.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyDirective<T> {
    Allow(T),
    /// Refuse this one request; the connection stays up
    Deny,
    /// Refuse and terminate the connection
    Forbid,
}

/// Decides which inbound requests reach local lanes. Every method allows by
/// default.
pub trait PolicyGate: Send + Sync {
    fn can_link(&self, request: LinkRequest, _identity: &Identity) -> PolicyDirective<LinkRequest> {
        PolicyDirective::Allow(request)
    }

    fn can_sync(&self, request: SyncRequest, _identity: &Identity) -> PolicyDirective<SyncRequest> {
        PolicyDirective::Allow(request)
    }

    fn can_command(
        &self,
        message: CommandMessage,
        _identity: &Identity,
    ) -> PolicyDirective<CommandMessage> {
        PolicyDirective::Allow(message)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Authentication {
    /// Carries the subject the connection now acts as
    Authenticated(Value),
    Unauthenticated,
    /// The credentials were not just wrong but unacceptable; the connection
    /// is closed
    Forbidden(String),
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credentials: &Value, identity: &Identity) -> Authentication;
}

/// What the hub should do with an inbound request
#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
    Admit(Envelope),
    /// Answer the peer with this envelope and drop the request
    Deny(Envelope),
    Forbid,
}

/// Applies the policy collaborator to inbound requests and tracks the
/// identity of the connection, both the peer's as seen by us and whether the
/// peer has accepted our own credentials.
pub struct AuthGate {
    policy: Option<Arc<dyn PolicyGate>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    identity: ArcSwap<Identity>,
    authenticated_remotely: AtomicBool,
}

impl AuthGate {
    pub fn new(
        policy: Option<Arc<dyn PolicyGate>>,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Self {
        Self {
            policy,
            authenticator,
            identity: ArcSwap::from_pointee(Identity::default()),
            authenticated_remotely: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> Arc<Identity> {
        self.identity.load_full()
    }

    /// Starts a fresh identity for a new connection.
    pub fn connected(&self, remote_address: Option<SocketAddr>, secure: bool) {
        self.identity.store(Arc::new(Identity {
            subject: None,
            remote_address,
            secure,
        }));
        self.authenticated_remotely.store(false, Ordering::Release);
    }

    pub fn disconnected(&self) {
        self.identity.store(Arc::new(Identity::default()));
        self.authenticated_remotely.store(false, Ordering::Release);
    }

    // Requests

    /// Runs `envelope` past the policy collaborator. Kinds other than link,
    /// sync and command are always admitted.
    pub fn admit(&self, envelope: Envelope) -> Admission {
        let Some(policy) = self.policy.as_ref() else {
            return Admission::Admit(envelope);
        };
        let identity = self.identity();
        let denial = denial_for(&envelope);
        let admission = match envelope {
            Envelope::Link(request) => match policy.can_link(request, &identity) {
                PolicyDirective::Allow(request) => Admission::Admit(request.into()),
                PolicyDirective::Deny => Admission::Deny(denial),
                PolicyDirective::Forbid => Admission::Forbid,
            },
            Envelope::Sync(request) => match policy.can_sync(request, &identity) {
                PolicyDirective::Allow(request) => Admission::Admit(request.into()),
                PolicyDirective::Deny => Admission::Deny(denial),
                PolicyDirective::Forbid => Admission::Forbid,
            },
            Envelope::Command(message) => match policy.can_command(message, &identity) {
                PolicyDirective::Allow(message) => Admission::Admit(message.into()),
                PolicyDirective::Deny => Admission::Deny(denial),
                PolicyDirective::Forbid => Admission::Forbid,
            },
            other => Admission::Admit(other),
        };
        match &admission {
            Admission::Deny(response) => {
                debug!("denied request for {:?}", response.lane_uri());
            }
            Admission::Forbid => {
                warn!("policy forbade a request from {:?}", identity.remote_address);
            }
            Admission::Admit(_) => {}
        }
        admission
    }

    // Authentication

    /// Checks the peer's credentials, recording the subject on success.
    /// Without an authenticator the credentials themselves become the subject.
    pub fn authenticate(&self, credentials: &Value) -> Authentication {
        let identity = self.identity();
        let outcome = match self.authenticator.as_ref() {
            Some(authenticator) => authenticator.authenticate(credentials, &identity),
            None => Authentication::Authenticated(credentials.clone()),
        };
        match &outcome {
            Authentication::Authenticated(subject) => {
                info!("peer {:?} authenticated", identity.remote_address);
                self.set_subject(Some(subject.clone()));
            }
            Authentication::Unauthenticated => {
                debug!("peer {:?} failed to authenticate", identity.remote_address);
                self.set_subject(None);
            }
            Authentication::Forbidden(reason) => {
                warn!(
                    "peer {:?} forbidden during authentication: {}",
                    identity.remote_address, reason
                );
                self.set_subject(None);
            }
        }
        outcome
    }

    pub fn deauthenticate(&self) {
        self.set_subject(None);
    }

    /// Whether the peer has accepted the credentials this host sent
    pub fn is_authenticated_remotely(&self) -> bool {
        self.authenticated_remotely.load(Ordering::Acquire)
    }

    pub fn set_authenticated_remotely(&self, authenticated: bool) {
        self.authenticated_remotely
            .store(authenticated, Ordering::Release);
    }

    fn set_subject(&self, subject: Option<Value>) {
        self.identity.rcu(|current| Identity {
            subject: subject.clone(),
            ..Identity::clone(current)
        });
    }
}

fn denial_for(envelope: &Envelope) -> Envelope {
    let node_uri = envelope.node_uri().cloned().unwrap_or_default();
    let lane_uri = envelope.lane_uri().cloned().unwrap_or_default();
    UnlinkedResponse::new(node_uri, lane_uri, Value::text("forbidden")).into()
}
