//! Error types for the session core.

use thiserror::Error;

/// Errors raised while deriving session values from the profile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// Domain or account is empty.
    #[error("profile has no account credentials")]
    MissingCredentials,

    /// Account and domain do not form a valid JID.
    #[error("invalid jid {jid}: {reason}")]
    InvalidJid {
        /// The rejected JID
        jid: String,
        /// Parser message
        reason: String,
    },
}
