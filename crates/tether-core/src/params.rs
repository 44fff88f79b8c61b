//! Connection parameters and registration progress.

use jid::BareJid;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Onboarding progress recorded in the profile.
///
/// Ordered: later steps compare greater than earlier ones.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RegistrationStep {
    /// Contact details not yet verified.
    #[default]
    ValidateContactInfo,
    /// Account being created on the chosen domain.
    CreateAccount,
    /// Legal identity being registered.
    RegisterIdentity,
    /// Waiting for the legal identity to be approved.
    ValidateIdentity,
    /// Local PIN being defined.
    DefinePin,
    /// Onboarding finished.
    Complete,
}

impl RegistrationStep {
    /// The profile has progressed far enough to hold account credentials.
    pub fn permits_connection(self) -> bool {
        self >= Self::CreateAccount
    }

    /// Signing keys may still be (re)generated.
    ///
    /// Once an identity has been submitted for approval, new keys would
    /// orphan it.
    pub fn permits_key_generation(self) -> bool {
        self <= Self::RegisterIdentity
    }
}

/// Snapshot of the profile values that identify an XMPP session.
///
/// Two snapshots are equal iff every field matches. Any difference means the
/// live transport was built for someone else and must be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Server domain.
    pub domain: String,
    /// Account (local part of the JID).
    pub account: String,
    /// Stored password hash.
    pub password_hash: String,
    /// Hash method used for `password_hash` (e.g. `SCRAM-SHA-256`).
    pub password_hash_method: String,
    /// Connect to the domain's default host instead of resolving SRV records.
    pub use_default_connectivity: bool,
}

impl ConnectionParameters {
    /// Both a domain and an account are present.
    pub fn has_credentials(&self) -> bool {
        !self.domain.is_empty() && !self.account.is_empty()
    }

    /// Bare JID `account@domain`.
    pub fn bare_jid(&self) -> Result<BareJid, ProfileError> {
        if !self.has_credentials() {
            return Err(ProfileError::MissingCredentials);
        }

        let raw = format!("{}@{}", self.account, self.domain);
        raw.parse::<BareJid>()
            .map_err(|e| ProfileError::InvalidJid { jid: raw, reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParameters {
        ConnectionParameters {
            domain: "lab.tagroot.io".into(),
            account: "alice".into(),
            password_hash: "c2VjcmV0".into(),
            password_hash_method: "SCRAM-SHA-256".into(),
            use_default_connectivity: false,
        }
    }

    #[test]
    fn steps_are_ordered() {
        assert!(RegistrationStep::Complete > RegistrationStep::CreateAccount);
        assert!(!RegistrationStep::ValidateContactInfo.permits_connection());
        assert!(RegistrationStep::CreateAccount.permits_connection());
        assert!(RegistrationStep::RegisterIdentity.permits_key_generation());
        assert!(!RegistrationStep::ValidateIdentity.permits_key_generation());
    }

    #[test]
    fn any_field_change_breaks_equality() {
        let base = params();

        let mut other = base.clone();
        other.password_hash = "b3RoZXI=".into();
        assert_ne!(base, other);

        let mut other = base.clone();
        other.use_default_connectivity = true;
        assert_ne!(base, other);

        assert_eq!(base, params());
    }

    #[test]
    fn bare_jid_joins_account_and_domain() {
        let jid = params().bare_jid().expect("valid jid");
        assert_eq!(jid.to_string(), "alice@lab.tagroot.io");
    }

    #[test]
    fn bare_jid_requires_credentials() {
        let mut p = params();
        p.account.clear();
        assert_eq!(p.bare_jid(), Err(ProfileError::MissingCredentials));
    }
}
