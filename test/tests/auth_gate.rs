/// AUTH GATE TESTS: policy admission and connection authentication
///
/// Link, sync and command requests pass the policy before reaching a lane.
/// A denial answers the one request with an `unlinked` envelope; a
/// prohibition closes the whole connection with a policy-violation frame.
use std::sync::Arc;

use meshlink_hub::{
    shared::{
        AuthRequest, AuthedResponse, CommandMessage, DeauthRequest, DeauthedResponse, Envelope,
        HostType, LinkRequest, SyncRequest, UnlinkedResponse, Value,
    },
    CloseFrame, ConnectionState, Frame,
};
use meshlink_test::*;

fn gated(policy: Arc<StaticPolicy>) -> TestHub {
    let test_hub = TestHub::with(HostType::Server, |builder| builder.policy(policy));
    test_hub.connect();
    test_hub
}

fn authenticating() -> TestHub {
    let authenticator = StaticAuthenticator::new(Value::text("good"), Value::text("bad"));
    let test_hub = TestHub::with(HostType::Server, |builder| {
        builder.authenticator(authenticator)
    });
    test_hub.connect();
    test_hub
}

fn forbidden(node_uri: &str, lane_uri: &str) -> Envelope {
    UnlinkedResponse::new(node_uri, lane_uri, Value::text("forbidden")).into()
}

// ========== Policy Tests ==========

#[test]
fn test_denied_link_is_answered_and_dropped() {
    let test_hub = gated(StaticPolicy::new(Verdict::Deny, Verdict::Allow, Verdict::Allow));

    test_hub.read(LinkRequest::new("house", "lights"));

    assert_eq!(test_hub.hub.downlink_count(), 0);
    assert_eq!(test_hub.runtime.open_count(), 0);
    assert_eq!(test_hub.flush(), vec![forbidden("house", "lights")]);
    assert!(test_hub.hub.is_connected());
}

#[test]
fn test_each_request_kind_has_its_own_verdict() {
    let test_hub = gated(StaticPolicy::new(Verdict::Deny, Verdict::Allow, Verdict::Deny));

    test_hub.read(SyncRequest::new("/house", "lights"));
    test_hub.read(CommandMessage::new("/garage", "door", Value::text("open")));

    assert_eq!(test_hub.hub.downlink_count(), 1);
    assert!(test_hub.runtime.commands().is_empty());
    assert_eq!(test_hub.flush(), vec![forbidden("/garage", "door")]);
}

#[test]
fn test_forbidden_request_closes_the_connection() {
    let test_hub = gated(StaticPolicy::new(Verdict::Forbid, Verdict::Allow, Verdict::Allow));

    test_hub.read(LinkRequest::new("/house", "lights"));

    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Closed);
    assert_eq!(test_hub.hub.downlink_count(), 0);
    assert_eq!(test_hub.transport.close_count(), 1);
    let frames = test_hub.transport.frames();
    assert_eq!(frames, vec![Frame::Close(CloseFrame::unauthorized())]);
    assert_eq!(CloseFrame::unauthorized().code, 1008);
}

#[test]
fn test_policy_sees_the_connection_identity() {
    let policy = StaticPolicy::new(Verdict::Allow, Verdict::Allow, Verdict::Allow);
    let test_hub = gated(policy.clone());

    test_hub.read(LinkRequest::new("/house", "lights"));
    test_hub.read(AuthRequest::new(Value::text("token")));
    test_hub.read(CommandMessage::new("/house", "lights", Value::Absent));

    let identities = policy.identities();
    assert_eq!(identities.len(), 2);
    assert_eq!(identities[0].remote_address, Some(REMOTE_ADDRESS));
    assert_eq!(identities[0].subject, None);
    assert_eq!(identities[1].subject, Some(Value::text("token")));
}

#[test]
fn test_without_a_policy_everything_is_admitted() {
    let test_hub = TestHub::connected();

    test_hub.read(LinkRequest::new("/house", "lights"));
    test_hub.read(CommandMessage::new("/garage", "door", Value::Absent));

    assert_eq!(test_hub.hub.downlink_count(), 1);
    assert_eq!(test_hub.runtime.commands().len(), 1);
    assert!(test_hub.flush().is_empty());
}

// ========== Peer Authentication Tests ==========

#[test]
fn test_accepted_credentials_set_the_subject() {
    let test_hub = authenticating();

    test_hub.read(AuthRequest::new(Value::text("good")));

    assert_eq!(
        test_hub.flush(),
        vec![Envelope::from(AuthedResponse::new(Value::text("subject")))]
    );
    let identity = test_hub.hub.identity();
    assert!(identity.is_authenticated());
    assert_eq!(identity.subject, Some(Value::text("subject")));
    assert_eq!(identity.remote_address, Some(REMOTE_ADDRESS));
}

#[test]
fn test_unknown_credentials_are_deauthed() {
    let test_hub = authenticating();

    test_hub.read(AuthRequest::new(Value::text("unknown")));

    assert_eq!(
        test_hub.flush(),
        vec![Envelope::from(DeauthedResponse::default())]
    );
    assert!(!test_hub.hub.identity().is_authenticated());
    assert!(test_hub.hub.is_connected());
}

#[test]
fn test_forbidden_credentials_close_the_connection() {
    let test_hub = authenticating();

    test_hub.read(AuthRequest::new(Value::text("bad")));

    assert_eq!(
        test_hub.transport.frames(),
        vec![
            Frame::Envelope(DeauthedResponse::default().into()),
            Frame::Close(CloseFrame::unauthorized()),
        ]
    );
    assert!(test_hub.hub.is_closed());
}

#[test]
fn test_deauth_drops_the_subject() {
    let test_hub = authenticating();
    test_hub.read(AuthRequest::new(Value::text("good")));
    test_hub.flush();

    test_hub.read(DeauthRequest::default());

    assert!(!test_hub.hub.identity().is_authenticated());
    assert_eq!(
        test_hub.flush(),
        vec![Envelope::from(DeauthedResponse::default())]
    );
}

#[test]
fn test_disconnect_forgets_the_identity() {
    let test_hub = TestHub::connected();
    test_hub.read(AuthRequest::new(Value::text("token")));
    assert!(test_hub.hub.identity().is_authenticated());

    test_hub.hub.did_disconnect();

    let identity = test_hub.hub.identity();
    assert!(!identity.is_authenticated());
    assert_eq!(identity.remote_address, None);
}

// ========== Local Authentication Tests ==========

#[test]
fn test_peer_verdict_on_our_credentials() {
    let test_hub = TestHub::connected();

    test_hub.hub.authenticate(Value::text("secret")).unwrap();
    assert_eq!(
        test_hub.flush(),
        vec![Envelope::from(AuthRequest::new(Value::text("secret")))]
    );
    assert!(!test_hub.hub.is_authenticated());

    test_hub.read(AuthedResponse::new(Value::text("us")));
    assert!(test_hub.hub.is_authenticated());

    test_hub.read(DeauthedResponse::default());
    assert!(!test_hub.hub.is_authenticated());
}

#[test]
fn test_reconnect_requires_authenticating_again() {
    let test_hub = TestHub::connected();
    test_hub.read(AuthedResponse::new(Value::text("us")));

    test_hub.hub.did_disconnect();
    test_hub.connect();

    assert!(!test_hub.hub.is_authenticated());
}
