/// LIFECYCLE TESTS: connect, disconnect, reconnect and close
///
/// A client hub reconnects with jittered exponential backoff after every
/// disconnect; a server hub closes instead. Closing runs every teardown step
/// exactly once, even when some of them fail.
use std::time::Duration;

use meshlink_hub::{
    shared::{Envelope, EventMessage, HostType, LinkRequest, SyncRequest, Uri, Value},
    ConnectionState, Flow, HubError, LaneError, LinkError, LinkStateError, PullOutcome,
    TransportError,
};
use meshlink_test::*;

fn assert_first_delay(delay: Duration) {
    assert!(
        delay >= Duration::from_millis(500) && delay <= Duration::from_millis(1500),
        "first reconnect delay {:?} outside initial timeout plus jitter",
        delay
    );
}

// ========== Connect Tests ==========

#[test]
fn test_open_then_connect() {
    let test_hub = TestHub::client();
    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Disconnected);

    test_hub.hub.open().unwrap();
    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Connecting);
    assert_eq!(test_hub.transport.opens().len(), 1);
    assert_eq!(test_hub.transport.opens()[0].as_str(), HOST_URI);

    test_hub.hub.did_connect();
    assert!(test_hub.hub.is_connected());
    assert_eq!(test_hub.runtime.connect_count(), 1);
    assert_eq!(test_hub.scheduler.cancel_count(), 1);
}

#[test]
fn test_connect_addresses_the_peer_by_its_socket() {
    let test_hub = TestHub::client();
    assert_eq!(test_hub.hub.remote_uri().as_str(), HOST_URI);
    test_hub.transport.set_secure(true);

    test_hub.connect();

    assert_eq!(test_hub.hub.remote_uri().as_str(), "warp://10.0.0.7:9001/");
    let identity = test_hub.hub.identity();
    assert_eq!(identity.remote_address, Some(REMOTE_ADDRESS));
    assert!(identity.secure);
    assert!(!identity.is_authenticated());
}

#[test]
fn test_open_is_a_no_op_unless_disconnected() {
    let test_hub = TestHub::connected();

    assert_eq!(test_hub.hub.open(), Ok(()));
    assert_eq!(test_hub.hub.reconnect(), Ok(()));

    assert_eq!(test_hub.transport.opens().len(), 1);
    assert!(test_hub.hub.is_connected());
}

#[test]
fn test_requests_queued_while_disconnected_flow_on_connect() {
    let test_hub = TestHub::client();
    let (uplink, binding) = test_hub.open_uplink("/house", "lights");

    uplink
        .queue_up(LinkRequest::new("/house", "lights").into())
        .unwrap();
    assert_eq!(test_hub.transport.pending_feeds(), 0, "parked until connect");
    assert_eq!(test_hub.hub.send_backlog(), 1);

    test_hub.connect();

    assert_eq!(binding.connect_count(), 1);
    assert_eq!(test_hub.transport.pending_feeds_for(uplink.state()), 1);
    assert_eq!(
        test_hub.flush(),
        vec![Envelope::from(LinkRequest::new("/house", "lights"))]
    );
    assert_eq!(test_hub.hub.send_backlog(), 0);
}

// ========== Disconnect Tests ==========

#[test]
fn test_client_schedules_a_reconnect_on_disconnect() {
    let test_hub = TestHub::connected();
    let (_uplink, binding) = test_hub.open_uplink("/house", "lights");

    test_hub.hub.did_disconnect();

    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Disconnected);
    assert_eq!(test_hub.runtime.disconnect_count(), 1);
    assert_eq!(binding.disconnect_count(), 1);
    assert_eq!(test_hub.hub.identity().remote_address, None);
    let scheduled = test_hub.scheduler.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_first_delay(scheduled[0]);
}

#[test]
fn test_failed_reconnects_back_off() {
    let test_hub = TestHub::connected();
    test_hub.hub.did_disconnect();
    test_hub.transport.fail_open(true);

    for _ in 0..3 {
        let result = test_hub.hub.reconnect();
        assert!(matches!(
            result,
            Err(HubError::Transport(TransportError::OpenFailed { .. }))
        ));
        assert_eq!(test_hub.hub.connection_state(), ConnectionState::Disconnected);
    }

    let scheduled = test_hub.scheduler.scheduled();
    assert_eq!(scheduled.len(), 4);
    assert_first_delay(scheduled[0]);
    for pair in scheduled.windows(2) {
        assert!(pair[1] > pair[0], "delays should grow: {:?}", scheduled);
    }
}

#[test]
fn test_connect_resets_the_backoff() {
    let test_hub = TestHub::connected();
    test_hub.hub.did_disconnect();
    test_hub.transport.fail_open(true);
    let _ = test_hub.hub.reconnect();
    let _ = test_hub.hub.reconnect();

    test_hub.transport.fail_open(false);
    test_hub.connect();
    test_hub.hub.did_disconnect();

    let scheduled = test_hub.scheduler.scheduled();
    assert_first_delay(*scheduled.last().unwrap());
}

#[test]
fn test_failed_open_schedules_a_reconnect() {
    let test_hub = TestHub::client();
    test_hub.transport.fail_open(true);

    let result = test_hub.hub.open();

    assert!(matches!(
        result,
        Err(HubError::Transport(TransportError::OpenFailed { .. }))
    ));
    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Disconnected);
    assert_eq!(test_hub.scheduler.scheduled().len(), 1);
}

#[test]
fn test_transport_failure_is_a_disconnect() {
    let test_hub = TestHub::connected();

    test_hub.hub.did_fail(TransportError::WriteFailed {
        reason: "broken pipe".to_string(),
    });

    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Disconnected);
    assert_eq!(test_hub.scheduler.scheduled().len(), 1);
}

#[test]
fn test_server_closes_instead_of_reconnecting() {
    let test_hub = TestHub::server();
    test_hub.connect();

    test_hub.hub.did_disconnect();

    assert!(test_hub.hub.is_closed());
    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Closed);
    assert!(test_hub.scheduler.scheduled().is_empty());
    assert_eq!(test_hub.runtime.close_count(), 1);
    assert_eq!(test_hub.transport.close_count(), 1);
}

#[test]
fn test_server_does_not_retry_a_failed_open() {
    let test_hub = TestHub::with(HostType::Server, |builder| builder);
    test_hub.transport.fail_open(true);

    assert!(test_hub.hub.open().is_err());
    assert!(test_hub.scheduler.scheduled().is_empty());
}

#[test]
fn test_disconnect_abandons_pulls_in_flight() {
    let test_hub = TestHub::connected();
    let (uplink, _binding) = test_hub.open_uplink("/house", "lights");
    uplink
        .queue_up(LinkRequest::new("/house", "lights").into())
        .unwrap();
    assert_eq!(test_hub.transport.pending_feeds(), 1);

    test_hub.hub.did_disconnect();
    let stale = test_hub.transport.pull_next();
    assert_eq!(
        stale,
        Some(PullOutcome::Failed(LinkError::State(
            LinkStateError::NotPulling { flow: Flow::Up }
        )))
    );
    assert!(test_hub.transport.take_envelopes().is_empty());

    test_hub.connect();
    assert_eq!(
        test_hub.flush(),
        vec![Envelope::from(LinkRequest::new("/house", "lights"))]
    );
}

#[test]
fn test_disconnect_drops_unsent_responses_but_remembers_sync() {
    let test_hub = TestHub::connected();
    test_hub.read(SyncRequest::new("/house", "lights"));
    let downlink = test_hub
        .hub
        .downlink(&Uri::from("/house"), &Uri::from("lights"))
        .unwrap();
    let context = test_hub.runtime.context("/house", "lights").unwrap();
    downlink
        .queue_down(EventMessage::new("/house", "lights", Value::text("on")).into())
        .unwrap();
    assert_eq!(test_hub.hub.send_backlog(), 1);

    test_hub.hub.did_disconnect();

    assert_eq!(downlink.state().len(Flow::Down), 0);
    assert_eq!(test_hub.hub.send_backlog(), 0);
    assert_eq!(test_hub.hub.receive_backlog(), 0);
    assert!(downlink.is_sync());
    assert_eq!(context.disconnect_count(), 1);
}

// ========== Close Tests ==========

#[test]
fn test_close_tears_everything_down_once() {
    let test_hub = TestHub::connected();
    let (uplink, binding) = test_hub.open_uplink("/house", "lights");
    test_hub.read(LinkRequest::new("/garage", "door"));
    let context = test_hub.runtime.context("/garage", "door").unwrap();

    assert_eq!(test_hub.hub.close(), Ok(()));
    assert_eq!(test_hub.hub.close(), Ok(()));

    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Closed);
    assert_eq!(test_hub.transport.close_count(), 1);
    assert_eq!(test_hub.runtime.close_count(), 1);
    assert_eq!(binding.close_count(), 1);
    assert_eq!(context.close_count(), 1);
    assert!(uplink.is_closed());
    assert_eq!(test_hub.hub.uplink_count(), 0);
    assert_eq!(test_hub.hub.downlink_count(), 0);
}

#[test]
fn test_closed_hub_refuses_new_work() {
    let test_hub = TestHub::connected();
    test_hub.hub.close().unwrap();

    assert_eq!(test_hub.hub.open(), Err(HubError::Closed));
    let opened = test_hub
        .hub
        .open_uplink("/house", "lights", RecordingContext::new());
    assert!(matches!(opened, Err(HubError::Closed)));
}

#[test]
fn test_closed_hub_refuses_the_peers_envelopes() {
    let test_hub = TestHub::connected();
    test_hub.hub.close().unwrap();

    let linked = test_hub
        .hub
        .did_read(LinkRequest::new("/house", "lights").into());
    let synced = test_hub
        .hub
        .did_read(SyncRequest::new("/garage", "door").into());

    assert_eq!(linked, Err(HubError::Closed));
    assert_eq!(synced, Err(HubError::Closed));
    assert_eq!(test_hub.runtime.open_count(), 0);
    assert_eq!(test_hub.hub.downlink_count(), 0);
    assert!(test_hub.transport.envelopes().is_empty());
}

#[test]
fn test_close_runs_every_step_and_reports_the_first_failure() {
    let test_hub = TestHub::connected();
    test_hub.runtime.fail_close(true);
    test_hub.transport.fail_close(true);

    let result = test_hub.hub.close();

    assert_eq!(
        result,
        Err(HubError::Lane(LaneError::CloseFailed {
            reason: "lanes still draining".to_string(),
        }))
    );
    assert_eq!(test_hub.runtime.close_count(), 1);
    assert_eq!(test_hub.transport.close_count(), 1);
    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Closed);
}

#[test]
fn test_disconnect_after_close_does_not_reconnect() {
    let test_hub = TestHub::connected();
    test_hub.hub.close().unwrap();

    test_hub.hub.did_disconnect();

    assert!(test_hub.scheduler.scheduled().is_empty());
    assert_eq!(test_hub.hub.connection_state(), ConnectionState::Closed);
}
