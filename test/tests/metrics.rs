/// METRICS TESTS: periodic host profiles
///
/// The hub counts link opens and closes, events, commands, reads and writes,
/// and hands a profile to its sink at most once per report interval.
use std::time::{Duration, Instant};

use meshlink_hub::shared::{CommandMessage, EventMessage, LinkRequest, Value};
use meshlink_test::*;

fn later(seconds: u64) -> Instant {
    Instant::now() + Duration::from_secs(seconds)
}

#[test]
fn test_no_profile_before_the_interval() {
    let test_hub = TestHub::connected();

    assert_eq!(test_hub.hub.flush_metrics(Instant::now()), None);
    assert!(test_hub.sink.profiles().is_empty());
}

#[test]
fn test_profile_counts_traffic() {
    let test_hub = TestHub::connected();
    let (uplink, _) = test_hub.open_uplink("/house", "lights");
    test_hub.open_uplink("/house", "lights");
    test_hub.open_uplink("/garage", "door");
    test_hub.read(LinkRequest::new("/house", "lights"));
    for index in 0..3 {
        test_hub.read(EventMessage::new("/house", "lights", Value::Num(index as f64)));
    }
    test_hub.read(CommandMessage::new("/house", "lights", Value::text("toggle")));
    uplink
        .queue_up(CommandMessage::new("/house", "lights", Value::text("dim")).into())
        .unwrap();
    test_hub.flush();

    let profile = test_hub.hub.flush_metrics(later(2)).expect("report due");

    assert_eq!(profile.node_count, 2);
    assert_eq!(profile.uplink_pulse.link_count, 3);
    assert_eq!(profile.uplink_pulse.event_count, 6, "each event reaches two uplinks");
    assert_eq!(profile.uplink_pulse.command_count, 1);
    assert_eq!(profile.downlink_pulse.link_count, 1);
    assert_eq!(profile.downlink_pulse.command_count, 1);
    assert_eq!(profile.agent_pulse.read_count, 5);
    assert_eq!(profile.agent_pulse.write_count, 1);
    assert!(profile.uplink_pulse.event_rate <= profile.uplink_pulse.event_count);
    assert_eq!(test_hub.sink.profiles(), vec![profile]);
}

#[test]
fn test_one_profile_per_interval() {
    let test_hub = TestHub::connected();
    let at = later(2);

    assert!(test_hub.hub.flush_metrics(at).is_some());
    assert_eq!(test_hub.hub.flush_metrics(at), None);
    assert_eq!(test_hub.sink.profiles().len(), 1);
}

#[test]
fn test_totals_survive_a_report() {
    let test_hub = TestHub::connected();
    let (_uplink, _binding) = test_hub.open_uplink("/house", "lights");
    test_hub.read(EventMessage::new("/house", "lights", Value::Absent));
    test_hub.hub.flush_metrics(later(2)).unwrap();

    let quiet = test_hub.hub.flush_metrics(later(4)).unwrap();

    assert_eq!(quiet.uplink_pulse.event_count, 1);
    assert_eq!(quiet.uplink_pulse.event_rate, 0);
    assert_eq!(quiet.agent_pulse.read_rate, 0);
}

#[test]
fn test_closed_links_leave_the_link_count() {
    let test_hub = TestHub::connected();
    let (first, _) = test_hub.open_uplink("/house", "lights");
    test_hub.open_uplink("/house", "lights");

    first.close_up();

    let profile = test_hub.hub.flush_metrics(later(2)).unwrap();
    assert_eq!(profile.uplink_pulse.link_count, 1);
    assert_eq!(profile.node_count, 1);
}
