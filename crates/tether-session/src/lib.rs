//! Tether session
//!
//! Keeps one XMPP session alive on behalf of an application. The
//! [`SessionManager`] follows the [`ProfileStore`], decides when the
//! transport must be built, reused or rebuilt, runs service discovery after
//! connecting, binds sub-clients to the discovered components and reconnects
//! stale transports on a fixed interval.
//!
//! # Components
//!
//! - [`SessionManager`]: Session lifecycle, reconnect timer and observers
//! - [`ProfileStore`]: Observable profile cell
//! - [`ServiceDiscovery`]: Component discovery against a transport
//! - [`EventBus`]: Ordered observer list for state transitions
//! - [`ConnectProbe`]: Onboarding checks with a throwaway transport
//! - [`TokioEnv`]: Production [`tether_core::env::Environment`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod discovery;
mod env;
mod error;
mod events;
mod manager;
mod probe;
mod profile;
mod reachability;
mod status;
mod tasks;
mod timeout;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_OFFLINE_PRESENCE_TIMEOUT,
    DEFAULT_RECONNECT_INTERVAL, SessionConfig,
};
pub use discovery::ServiceDiscovery;
pub use env::TokioEnv;
pub use error::SessionError;
pub use events::{EventBus, HandlerError, SubscriptionId};
pub use manager::{CreationOutcome, SessionDeps, SessionManager};
pub use probe::{ConnectOutcome, ConnectProbe};
pub use profile::{Profile, ProfileStore};
pub use reachability::{NetworkReachability, ReachabilityFlag};
pub use status::error_banner;
pub use tasks::TaskFailure;
