//! Observed connection status and the error banner.

use tether_core::ConnectionState;

/// What the session manager has observed about its transport.
#[derive(Debug, Clone)]
pub(crate) struct Status<I> {
    pub(crate) state: ConnectionState,
    pub(crate) since: I,
    pub(crate) latest_error: Option<String>,
    pub(crate) latest_connection_error: Option<String>,
}

impl<I: Copy> Status<I> {
    pub(crate) fn new(now: I) -> Self {
        Self {
            state: ConnectionState::Offline,
            since: now,
            latest_error: None,
            latest_connection_error: None,
        }
    }

    /// Record a state. Entering `Connecting` clears both error fields.
    pub(crate) fn enter(&mut self, state: ConnectionState, now: I) {
        if state == ConnectionState::Connecting {
            self.latest_error = None;
            self.latest_connection_error = None;
        }
        self.state = state;
        self.since = now;
    }
}

/// Compose the user-facing error text from the two error fields.
///
/// The connection error wins when both are set and differ.
pub fn error_banner(
    latest_error: Option<&str>,
    latest_connection_error: Option<&str>,
) -> Option<String> {
    match (latest_error, latest_connection_error) {
        (None, None) => None,
        (Some(error), None) => Some(error.to_string()),
        (_, Some(connection)) => Some(connection.to_string()),
    }
}
