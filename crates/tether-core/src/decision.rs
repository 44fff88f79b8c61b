//! Staleness and recreate-vs-reuse decisions.
//!
//! The session manager asks two questions every time something might have
//! changed (explicit load, profile change, reconnect tick):
//!
//! 1. Is the live transport stale? See [`staleness`].
//! 2. Given the profile, should the transport be reused, its sub-clients
//!    refreshed, or the whole session rebuilt? See [`decide`].
//!
//! Both answers are tagged values carrying the reason, so transitions can be
//! logged and tested exhaustively.

use std::{collections::BTreeMap, fmt, ops::Sub, time::Duration};

use crate::{
    component::{ComponentAddresses, ServiceKind},
    params::ConnectionParameters,
    state::ConnectionState,
};

/// Default time a transport may spend outside `Connected` before it is
/// considered stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);

/// Why a transport is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No transport exists.
    NoTransport,
    /// Transport is offline.
    Offline,
    /// Transport is in the error state.
    Error,
    /// Transport has been stuck in a non-connected state for too long.
    Stuck {
        /// State it is stuck in
        state: ConnectionState,
        /// Time spent in that state
        elapsed: Duration,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTransport => f.write_str("no transport"),
            Self::Offline => f.write_str("offline"),
            Self::Error => f.write_str("error state"),
            Self::Stuck { state, elapsed } => write!(f, "stuck in {state} for {elapsed:?}"),
        }
    }
}

/// Decide whether the observed transport state is stale.
///
/// `observed` is the current state and the instant it was entered, or `None`
/// when no transport exists.
pub fn staleness<I>(
    observed: Option<(ConnectionState, I)>,
    now: I,
    stale_after: Duration,
) -> Option<StaleReason>
where
    I: Copy + Sub<Output = Duration>,
{
    let Some((state, since)) = observed else {
        return Some(StaleReason::NoTransport);
    };

    match state {
        ConnectionState::Connected => None,
        ConnectionState::Offline => Some(StaleReason::Offline),
        ConnectionState::Error => Some(StaleReason::Error),
        state => {
            let elapsed = now - since;
            (elapsed > stale_after).then_some(StaleReason::Stuck { state, elapsed })
        },
    }
}

/// Why an existing session must be torn down and rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateReason {
    /// Domain, account or credentials differ from the profile.
    ParametersChanged,
    /// The transport is stale.
    Stale(StaleReason),
}

impl fmt::Display for RecreateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParametersChanged => f.write_str("connection parameters changed"),
            Self::Stale(reason) => write!(f, "stale transport: {reason}"),
        }
    }
}

/// Outcome of the recreate-vs-reuse decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecreateDecision {
    /// No session exists; create one.
    Create,
    /// Tear the session down and create a new one.
    Recreate(RecreateReason),
    /// Keep the transport, rebind the listed sub-clients.
    RefreshSubClients(Vec<ServiceKind>),
    /// Keep everything as is.
    Reuse,
}

/// What the session manager currently has running.
#[derive(Debug, Clone, Copy)]
pub struct LiveView<'a> {
    /// Parameters the live transport was built with.
    pub params: &'a ConnectionParameters,
    /// Address each live sub-client is bound to.
    pub bound: &'a BTreeMap<ServiceKind, String>,
}

/// Sub-client kinds whose binding disagrees with the profile.
///
/// A kind disagrees when a client exists for a different (or no longer
/// known) address, or when an address is known but no client exists.
pub fn binding_mismatches(
    bound: &BTreeMap<ServiceKind, String>,
    addresses: &ComponentAddresses,
) -> Vec<ServiceKind> {
    ServiceKind::ALL
        .into_iter()
        .filter(|kind| kind.has_sub_client())
        .filter(|kind| bound.get(kind).map(String::as_str) != addresses.get(*kind))
        .collect()
}

/// Decide what to do with the live session.
///
/// Parameter mismatches and staleness rebuild the transport. Sub-client
/// mismatches alone only rebind those sub-clients: the stream stays up so
/// in-flight stanzas are not lost.
pub fn decide(
    live: Option<LiveView<'_>>,
    expected: &ConnectionParameters,
    addresses: &ComponentAddresses,
    stale: Option<StaleReason>,
) -> RecreateDecision {
    let Some(live) = live else {
        return RecreateDecision::Create;
    };

    if live.params != expected {
        return RecreateDecision::Recreate(RecreateReason::ParametersChanged);
    }

    if let Some(reason) = stale {
        return RecreateDecision::Recreate(RecreateReason::Stale(reason));
    }

    let mismatched = binding_mismatches(live.bound, addresses);
    if mismatched.is_empty() {
        RecreateDecision::Reuse
    } else {
        RecreateDecision::RefreshSubClients(mismatched)
    }
}
