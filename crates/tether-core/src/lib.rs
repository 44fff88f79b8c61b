//! Tether core
//!
//! Sans-IO building blocks for keeping an XMPP session alive: the connection
//! state enum, the parameters that identify a session, discovered component
//! addresses, and the pure decision functions that tell the session manager
//! whether to reuse, refresh or rebuild its transport.
//!
//! Nothing in this crate performs I/O. Time enters through arguments (or
//! through [`env::Environment`] for the async layers above), which keeps every
//! decision deterministic and easy to property-test.
//!
//! # Components
//!
//! - [`ConnectionState`]: Transport state as observed by the session manager
//! - [`ConnectionParameters`]: Snapshot of the profile values that identify a
//!   session
//! - [`ComponentAddresses`]: Discovered server components keyed by
//!   [`ServiceKind`]
//! - [`discovery`]: Feature-to-service mapping for service discovery
//! - [`decision`]: Staleness and recreate-vs-reuse decisions

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod component;
pub mod decision;
pub mod discovery;
pub mod env;
pub mod error;
pub mod params;
pub mod state;

pub use component::{ComponentAddresses, ServiceKind};
pub use decision::{RecreateDecision, RecreateReason, StaleReason};
pub use discovery::{DiscoInfo, DiscoveryOutcome};
pub use error::ProfileError;
pub use params::{ConnectionParameters, RegistrationStep};
pub use state::ConnectionState;
