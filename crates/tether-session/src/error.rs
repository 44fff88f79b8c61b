//! Session error types.
//!
//! Most failures inside the session manager are caught at the routine
//! boundary, logged, and turned into `false` or an offline state. The
//! variants here are what remains visible to callers: the fatal key refusal,
//! plus the failures of explicit operations that return `Result`.

use tether_client::{SubClientError, TransportError};
use tether_core::{ProfileError, RegistrationStep};
use thiserror::Error;

/// Errors surfaced by the session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Signing keys are missing and the registration step forbids generating
    /// them. Continuing would produce a session with an unusable identity.
    #[error("key generation not permitted at registration step {step:?}")]
    KeyGenerationNotPermitted {
        /// Registration step at the time of the attempt
        step: RegistrationStep,
    },

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-fatal sub-client failure.
    #[error("sub-client error: {0}")]
    SubClient(SubClientError),

    /// Service discovery failed as a whole.
    #[error("service discovery failed: {0}")]
    Discovery(String),

    /// Operation needs a transport and none exists.
    #[error("no transport")]
    NoTransport,

    /// Profile values are unusable.
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl SessionError {
    /// Returns true if the error must reach the caller instead of being
    /// logged and absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyGenerationNotPermitted { .. })
    }
}
