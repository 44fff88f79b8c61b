//! Property-based tests for transport event handling.
//!
//! Arbitrary event sequences are pushed through a live session and the
//! observed status is compared against a simple model.

use std::time::Duration;

use proptest::prelude::*;
use tether_core::ConnectionState;
use tether_harness::{SessionFixture, SimTransport};
use tether_session::CreationOutcome;

#[derive(Debug, Clone)]
enum Pushed {
    State(ConnectionState),
    Error(String),
    ConnectionError(String),
}

const STATES: [ConnectionState; 9] = [
    ConnectionState::Offline,
    ConnectionState::Connecting,
    ConnectionState::StreamNegotiation,
    ConnectionState::StreamOpened,
    ConnectionState::StartingEncryption,
    ConnectionState::Authenticating,
    ConnectionState::Registering,
    ConnectionState::Connected,
    ConnectionState::Error,
];

fn pushed_strategy() -> impl Strategy<Value = Pushed> {
    prop_oneof![
        3 => prop::sample::select(STATES.to_vec()).prop_map(Pushed::State),
        1 => "[a-z-]{1,12}".prop_map(Pushed::Error),
        1 => "[a-z ]{1,12}".prop_map(Pushed::ConnectionError),
    ]
}

#[derive(Default)]
struct Model {
    states: Vec<ConnectionState>,
    latest_error: Option<String>,
    latest_connection_error: Option<String>,
}

impl Model {
    fn apply(&mut self, event: &Pushed) {
        match event {
            Pushed::State(state) => {
                if *state == ConnectionState::Connecting {
                    self.latest_error = None;
                    self.latest_connection_error = None;
                }
                self.states.push(*state);
            },
            Pushed::Error(message) => self.latest_error = Some(message.clone()),
            Pushed::ConnectionError(message) => {
                self.latest_connection_error = Some(message.clone());
            },
        }
    }
}

fn push(transport: &SimTransport, event: &Pushed) {
    match event {
        Pushed::State(state) => transport.push_state(*state),
        Pushed::Error(message) => transport.push_error(message.clone()),
        Pushed::ConnectionError(message) => transport.push_connection_error(message.clone()),
    }
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn observed_status_follows_event_order(
        events in prop::collection::vec(pushed_strategy(), 1..40)
    ) {
        paused_runtime().block_on(async {
            let fixture = SessionFixture::new();
            assert_eq!(fixture.manager.ensure_session(true).await, Ok(CreationOutcome::Created));
            assert!(fixture.manager.wait_for_connected(Duration::from_secs(5)).await);
            fixture.manager.settle().await;
            let transport = fixture.transports.latest().expect("transport built");

            let mut states = fixture.manager.subscribe();
            let mut model = Model::default();
            for event in &events {
                model.apply(event);
                push(&transport, event);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;

            let mut seen = Vec::new();
            while let Ok(state) = states.try_recv() {
                seen.push(state);
            }
            assert_eq!(seen, model.states);
            if let Some(last) = model.states.last() {
                assert_eq!(fixture.manager.state(), *last);
            }
            assert_eq!(fixture.manager.latest_error(), model.latest_error);
            assert_eq!(fixture.manager.latest_connection_error(), model.latest_connection_error);
        });
    }
}
