//! Onboarding connection probes.
//!
//! During onboarding the user enters a domain or account and the application
//! checks it with a throwaway transport before committing it to the profile.
//! The probe connects, watches the transport's events and resolves on the
//! first qualifying state in event order:
//!
//! - a success state for the probe kind resolves as success;
//! - `Error` or `Offline` resolves as failure with the latest error text;
//! - the timeout resolves as failure.
//!
//! Later events are ignored once the outcome is decided.

use std::time::Duration;

use tether_client::{TransportEvent, TransportHandle};
use tether_core::{ConnectionState, DiscoveryOutcome, env::Environment};

use crate::timeout::with_timeout;

/// What a probe must reach to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectProbe {
    /// The server answered and asked us to authenticate. Validates a domain.
    ReachServer,
    /// Authentication completed. Validates account credentials.
    SignIn,
}

impl ConnectProbe {
    /// `state` resolves this probe as successful.
    pub fn succeeds_on(self, state: ConnectionState) -> bool {
        match self {
            Self::ReachServer => state.reached_server(),
            Self::SignIn => state == ConnectionState::Connected,
        }
    }
}

/// Result of a connection probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// Probe reached its target state.
    pub succeeded: bool,
    /// Failure description.
    pub reason: Option<String>,
    /// Discovery run on the probe transport, if one was requested and
    /// completed.
    pub discovery: Option<DiscoveryOutcome>,
}

impl ConnectOutcome {
    pub(crate) fn success() -> Self {
        Self { succeeded: true, reason: None, discovery: None }
    }

    pub(crate) fn failure(reason: impl Into<String>) -> Self {
        Self { succeeded: false, reason: Some(reason.into()), discovery: None }
    }
}

/// Connect `handle` and wait for the probe to resolve.
///
/// Does not disconnect; the caller owns the transport.
pub(crate) async fn run<E: Environment>(
    env: &E,
    handle: TransportHandle,
    domain_override: Option<&str>,
    probe: ConnectProbe,
    timeout: Duration,
) -> ConnectOutcome {
    let TransportHandle { client, mut events } = handle;

    let watch = async {
        if let Err(e) = client.connect(domain_override).await {
            return ConnectOutcome::failure(e.to_string());
        }

        let mut latest_error = None;
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::StateChanged(state) if probe.succeeds_on(state) => {
                    return ConnectOutcome::success();
                },
                TransportEvent::StateChanged(state) if state.is_down() => {
                    return ConnectOutcome::failure(
                        latest_error.unwrap_or_else(|| format!("transport entered {state}")),
                    );
                },
                TransportEvent::Error(message) | TransportEvent::ConnectionError(message) => {
                    latest_error = Some(message);
                },
                TransportEvent::StateChanged(_) | TransportEvent::Stanza(_) => {},
            }
        }

        ConnectOutcome::failure(latest_error.unwrap_or_else(|| "transport closed".to_string()))
    };

    let outcome = with_timeout(env, timeout, watch)
        .await
        .unwrap_or_else(|| ConnectOutcome::failure(format!("timed out after {timeout:?}")));

    tracing::debug!(
        ?probe,
        succeeded = outcome.succeeded,
        reason = ?outcome.reason,
        "probe resolved"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reach_server_accepts_authentication_prompt() {
        assert!(ConnectProbe::ReachServer.succeeds_on(ConnectionState::Authenticating));
        assert!(ConnectProbe::ReachServer.succeeds_on(ConnectionState::Registering));
        assert!(ConnectProbe::ReachServer.succeeds_on(ConnectionState::Connected));
        assert!(!ConnectProbe::ReachServer.succeeds_on(ConnectionState::StreamOpened));
    }

    #[test]
    fn sign_in_needs_connected() {
        assert!(!ConnectProbe::SignIn.succeeds_on(ConnectionState::Authenticating));
        assert!(ConnectProbe::SignIn.succeeds_on(ConnectionState::Connected));
    }
}
