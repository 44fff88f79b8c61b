//! Transport connection state.
//!
//! ```text
//! Offline ─> Connecting ─> StreamNegotiation ─> StreamOpened ─> StartingEncryption
//!                                                                     │
//!              Connected <─ Registering <─ Authenticating <───────────┘
//!
//! any state ─> Error | Offline
//! ```
//!
//! The transport owns the current value. Everything else observes it through
//! events and never writes it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection state reported by the transport client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection.
    Offline,
    /// TCP/DNS connection in progress.
    Connecting,
    /// Negotiating the XML stream.
    StreamNegotiation,
    /// Stream opened, features received.
    StreamOpened,
    /// TLS upgrade in progress.
    StartingEncryption,
    /// SASL authentication in progress.
    Authenticating,
    /// In-band account registration in progress.
    Registering,
    /// Session established and bound.
    Connected,
    /// Connection failed.
    Error,
}

impl ConnectionState {
    /// Session is established.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Connection is down and will not recover without a reconnect.
    pub fn is_down(self) -> bool {
        matches!(self, Self::Offline | Self::Error)
    }

    /// The server answered and the stream reached authentication.
    ///
    /// Used by onboarding probes that only need to know the domain hosts a
    /// working XMPP server.
    pub fn reached_server(self) -> bool {
        matches!(self, Self::Authenticating | Self::Registering | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::StreamNegotiation => "stream-negotiation",
            Self::StreamOpened => "stream-opened",
            Self::StartingEncryption => "starting-encryption",
            Self::Authenticating => "authenticating",
            Self::Registering => "registering",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Authenticating.is_connected());
        assert!(!ConnectionState::Error.is_connected());
    }

    #[test]
    fn offline_and_error_are_down() {
        assert!(ConnectionState::Offline.is_down());
        assert!(ConnectionState::Error.is_down());
        assert!(!ConnectionState::Connecting.is_down());
    }

    #[test]
    fn authenticating_reaches_server() {
        assert!(ConnectionState::Authenticating.reached_server());
        assert!(ConnectionState::Registering.reached_server());
        assert!(ConnectionState::Connected.reached_server());
        assert!(!ConnectionState::StreamOpened.reached_server());
    }
}
