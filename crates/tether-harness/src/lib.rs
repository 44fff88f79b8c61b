//! Deterministic simulation harness for session testing.
//!
//! Simulated implementations of the transport and sub-client seams, driven
//! by tokio's clock so tests can run on a paused runtime and step through
//! reconnect intervals and timeouts without waiting.
//!
//! # Components
//!
//! - [`SimServer`]: Server directory answering discovery queries
//! - [`SimTransport`] / [`SimTransportFactory`]: Scripted connections with
//!   call counters
//! - [`RecordingSubClientFactory`]: Sub-clients that count disposals
//! - [`SessionFixture`]: A session manager wired to all of the above

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixture;
pub mod recording;
pub mod sim_server;
pub mod sim_transport;

pub use fixture::{DOMAIN, FixtureOptions, SessionFixture, onboarded_params, onboarded_profile};
pub use recording::RecordingSubClientFactory;
pub use sim_server::{SimServer, standard_component};
pub use sim_transport::{
    ConnectBehavior, DEFAULT_CONNECT_LATENCY, SimTransport, SimTransportFactory,
};
