//! Error types for transports and sub-clients.

use std::time::Duration;

use tether_core::ServiceKind;
use thiserror::Error;

/// Errors reported by a transport client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established (DNS, TCP, TLS, authentication).
    #[error("connection failed: {0}")]
    Connection(String),

    /// Operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Server answered with a stanza-level error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport was disconnected or disposed.
    #[error("transport closed")]
    Closed,
}

/// Errors raised while creating or disposing sub-clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubClientError {
    /// Signing keys are missing and the registration step forbids generating
    /// new ones.
    #[error("key generation not permitted for {kind}")]
    KeyGenerationNotPermitted {
        /// Sub-client that needed keys
        kind: ServiceKind,
    },

    /// Sub-client could not be constructed.
    #[error("failed to create {kind} client: {reason}")]
    Creation {
        /// Sub-client kind
        kind: ServiceKind,
        /// Error message
        reason: String,
    },

    /// Sub-client failed while shutting down.
    #[error("failed to dispose {kind} client: {reason}")]
    Dispose {
        /// Sub-client kind
        kind: ServiceKind,
        /// Error message
        reason: String,
    },

    /// Sub-client was already disposed.
    #[error("{0} client already disposed")]
    AlreadyDisposed(ServiceKind),
}

impl SubClientError {
    /// Returns true if the error must abort session creation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyGenerationNotPermitted { .. })
    }
}
