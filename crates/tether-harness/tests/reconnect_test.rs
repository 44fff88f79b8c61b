//! Reconnect timer behaviour on tokio's paused clock.

use std::time::Duration;

use tether_core::ConnectionState;
use tether_harness::{ConnectBehavior, FixtureOptions, SessionFixture};
use tether_session::{CreationOutcome, SessionConfig};
use tokio::time::{Instant, sleep_until};

fn secs(n: f64) -> Duration {
    Duration::from_secs_f64(n)
}

async fn start(fixture: &SessionFixture) -> Instant {
    let start = Instant::now();
    assert_eq!(fixture.manager.ensure_session(true).await, Ok(CreationOutcome::Created));
    assert!(fixture.manager.wait_for_connected(secs(5.0)).await);
    start
}

#[tokio::test(start_paused = true)]
async fn connected_transition_restarts_interval() {
    let fixture = SessionFixture::new();
    let t0 = start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    sleep_until(t0 + secs(6.0)).await;
    transport.push_state(ConnectionState::Error);
    sleep_until(t0 + secs(7.0)).await;
    transport.push_state(ConnectionState::Connected);
    sleep_until(t0 + secs(8.0)).await;
    transport.push_state(ConnectionState::Error);

    // The first window would have ended at t0 + 10s.
    sleep_until(t0 + secs(12.0)).await;
    assert_eq!(transport.reconnect_count(), 0);

    // The window restarted at t0 + 7s ends at t0 + 17s.
    sleep_until(t0 + secs(18.0)).await;
    assert_eq!(transport.reconnect_count(), 1);
    assert!(fixture.manager.is_online());
}

// A one-second interval puts both errors inside a few ticks; the default interval is covered below.
#[tokio::test(start_paused = true)]
async fn two_errors_in_quick_succession_both_reconnect() {
    let config = SessionConfig { reconnect_interval: secs(1.0), ..SessionConfig::default() };
    let fixture = SessionFixture::build(FixtureOptions { config, ..FixtureOptions::default() });
    let t0 = start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    sleep_until(t0 + secs(0.5)).await;
    transport.push_state(ConnectionState::Error);
    sleep_until(t0 + secs(1.6)).await;
    assert_eq!(transport.reconnect_count(), 1);

    transport.push_state(ConnectionState::Error);
    sleep_until(t0 + secs(3.0)).await;

    assert_eq!(transport.reconnect_count(), 2);
    assert!(fixture.manager.is_online());
    assert_eq!(fixture.transports.created(), 1, "reconnect must not rebuild the transport");
}

#[tokio::test(start_paused = true)]
async fn successive_errors_reconnect_at_default_interval() {
    let fixture = SessionFixture::new();
    let t0 = start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    sleep_until(t0 + secs(0.5)).await;
    transport.push_state(ConnectionState::Error);

    // Connected at t0 + 0.05s restarted the interval, so the tick lands near t0 + 10.05s.
    sleep_until(t0 + secs(9.9)).await;
    assert_eq!(transport.reconnect_count(), 0);
    sleep_until(t0 + secs(10.5)).await;
    assert_eq!(transport.reconnect_count(), 1);
    assert!(fixture.manager.is_online());

    sleep_until(t0 + secs(11.5)).await;
    transport.push_state(ConnectionState::Error);

    // The reconnect's own Connected restarted the interval near t0 + 10.1s.
    sleep_until(t0 + secs(19.9)).await;
    assert_eq!(transport.reconnect_count(), 1);
    sleep_until(t0 + secs(21.0)).await;
    assert_eq!(transport.reconnect_count(), 2);
    assert!(fixture.manager.is_online());
    assert_eq!(fixture.transports.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_reconnect_is_retried_every_interval() {
    let fixture = SessionFixture::new();
    let t0 = start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    fixture.transports.set_behavior(ConnectBehavior::Unreachable("connection reset".into()));
    transport.push_state(ConnectionState::Error);

    sleep_until(t0 + secs(11.0)).await;
    assert_eq!(transport.reconnect_count(), 1);
    sleep_until(t0 + secs(21.0)).await;
    assert_eq!(transport.reconnect_count(), 2);
    assert_eq!(fixture.manager.latest_connection_error().as_deref(), Some("connection reset"));
}

#[tokio::test(start_paused = true)]
async fn unreachable_network_suppresses_reconnect() {
    let fixture = SessionFixture::new();
    let t0 = start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    fixture.reachability.set(false);
    transport.push_state(ConnectionState::Error);

    sleep_until(t0 + secs(25.0)).await;
    assert_eq!(transport.reconnect_count(), 0);

    fixture.reachability.set(true);
    sleep_until(t0 + secs(31.0)).await;
    assert_eq!(transport.reconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn healthy_session_is_left_alone() {
    let fixture = SessionFixture::new();
    let t0 = start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    sleep_until(t0 + secs(60.0)).await;

    assert_eq!(transport.reconnect_count(), 0);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_handshake_becomes_stale() {
    let fixture = SessionFixture::new();
    fixture.transports.set_behavior(ConnectBehavior::Hang);
    let t0 = Instant::now();
    fixture.manager.ensure_session(true).await.expect("no fatal error");
    let transport = fixture.transports.latest().expect("transport built");

    // Stuck for exactly the threshold at the first tick: not yet stale.
    sleep_until(t0 + secs(10.5)).await;
    assert_eq!(transport.reconnect_count(), 0);

    sleep_until(t0 + secs(20.5)).await;
    assert_eq!(transport.reconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_session_is_rebuilt_by_creation_routine() {
    let fixture = SessionFixture::new();
    start(&fixture).await;
    let transport = fixture.transports.latest().expect("transport built");

    transport.push_state(ConnectionState::Error);
    tokio::time::sleep(secs(0.1)).await;

    assert_eq!(fixture.manager.ensure_session(true).await, Ok(CreationOutcome::Recreated));
    assert_eq!(fixture.transports.created(), 2);
    assert_eq!(transport.disconnect_count(), 1);
}
