//! Signing keys for the legal identity client.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::sync::{Mutex, PoisonError};

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tether_core::ServiceKind;

use crate::error::SubClientError;

/// Holds the account's identity signing key.
///
/// Keys are generated lazily, and only when the caller says the current
/// registration step allows it.
#[derive(Default)]
pub struct KeyRing {
    key: Mutex<Option<SigningKey>>,
}

impl KeyRing {
    /// Empty key ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Key ring holding an existing key.
    pub fn with_key(key: SigningKey) -> Self {
        Self { key: Mutex::new(Some(key)) }
    }

    /// Key ring holding a freshly generated key, as on a device that
    /// finished onboarding earlier.
    pub fn provisioned() -> Self {
        Self::with_key(SigningKey::generate(&mut OsRng))
    }

    /// A key is present.
    pub fn has_key(&self) -> bool {
        self.key.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Public key, generating a key pair first if allowed.
    ///
    /// # Errors
    ///
    /// - `SubClientError::KeyGenerationNotPermitted` if no key exists and
    ///   `can_generate` is false
    pub fn public_key(&self, can_generate: bool) -> Result<VerifyingKey, SubClientError> {
        let mut slot = self.key.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(key) = slot.as_ref() {
            return Ok(key.verifying_key());
        }

        if !can_generate {
            return Err(SubClientError::KeyGenerationNotPermitted {
                kind: ServiceKind::LegalIdentities,
            });
        }

        let key = SigningKey::generate(&mut OsRng);
        let public = key.verifying_key();
        *slot = Some(key);
        tracing::info!("generated identity signing key");
        Ok(public)
    }

    /// Sign `message`. `None` if no key exists.
    pub fn sign(&self, message: &[u8]) -> Option<Signature> {
        self.key.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|k| k.sign(message))
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::Verifier;

    use super::*;

    #[test]
    fn refuses_generation_when_not_permitted() {
        let ring = KeyRing::new();
        assert_eq!(
            ring.public_key(false),
            Err(SubClientError::KeyGenerationNotPermitted { kind: ServiceKind::LegalIdentities })
        );
        assert!(!ring.has_key());
    }

    #[test]
    fn generated_key_is_stable_and_signs() {
        let ring = KeyRing::new();
        let first = ring.public_key(true).expect("generate");
        let second = ring.public_key(false).expect("existing key");
        assert_eq!(first, second);

        let signature = ring.sign(b"identity").expect("signature");
        assert!(first.verify(b"identity", &signature).is_ok());
    }

    #[test]
    fn existing_key_is_used_without_permission() {
        let ring = KeyRing::with_key(SigningKey::from_bytes(&[7u8; 32]));
        assert!(ring.public_key(false).is_ok());
    }

    #[test]
    fn provisioned_ring_needs_no_permission() {
        let ring = KeyRing::provisioned();
        assert!(ring.has_key());
        assert!(ring.public_key(false).is_ok());
    }
}
