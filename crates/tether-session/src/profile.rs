//! Profile store.
//!
//! Holds the durable identity values the session depends on and notifies
//! subscribers when they change. Backed by a `tokio::sync::watch` cell: each
//! update replaces the whole value under the channel's lock, so readers never
//! see a half-applied update, and subscribers are woken only after the new
//! value is in place. Updates that leave the profile unchanged wake nobody.

use serde::{Deserialize, Serialize};
use tether_core::{
    ComponentAddresses, ConnectionParameters, DiscoveryOutcome, RegistrationStep, discovery,
};
use tokio::sync::watch;

/// Durable identity and configuration values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Server domain.
    pub domain: String,
    /// Account name.
    pub account: String,
    /// Password hash.
    pub password_hash: String,
    /// Password hash method.
    pub password_hash_method: String,
    /// Skip SRV lookup and connect to the domain directly.
    pub use_default_connectivity: bool,
    /// Onboarding progress.
    pub step: RegistrationStep,
    /// Discovered component addresses.
    pub components: ComponentAddresses,
    /// Last discovery run was incomplete.
    pub needs_update: bool,
}

impl Profile {
    /// Parameters identifying the session this profile asks for.
    pub fn connection_parameters(&self) -> ConnectionParameters {
        ConnectionParameters {
            domain: self.domain.clone(),
            account: self.account.clone(),
            password_hash: self.password_hash.clone(),
            password_hash_method: self.password_hash_method.clone(),
            use_default_connectivity: self.use_default_connectivity,
        }
    }

    /// Step and credentials allow a session.
    pub fn permits_connection(&self) -> bool {
        self.step.permits_connection() && self.connection_parameters().has_credentials()
    }

    /// Discovery should run after the next connect.
    pub fn wants_discovery(&self) -> bool {
        self.needs_update || !self.components.is_complete()
    }
}

/// Observable profile cell.
pub struct ProfileStore {
    tx: watch::Sender<Profile>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new(Profile::default())
    }
}

impl ProfileStore {
    /// Store holding `profile`.
    pub fn new(profile: Profile) -> Self {
        let (tx, _rx) = watch::channel(profile);
        Self { tx }
    }

    /// Copy of the current profile.
    pub fn snapshot(&self) -> Profile {
        self.tx.borrow().clone()
    }

    /// Current connection parameters.
    pub fn connection_parameters(&self) -> ConnectionParameters {
        self.tx.borrow().connection_parameters()
    }

    /// Current registration step.
    pub fn step(&self) -> RegistrationStep {
        self.tx.borrow().step
    }

    /// Current component addresses.
    pub fn components(&self) -> ComponentAddresses {
        self.tx.borrow().components.clone()
    }

    /// Receiver notified after every effective change.
    pub fn subscribe(&self) -> watch::Receiver<Profile> {
        self.tx.subscribe()
    }

    /// Apply `f` atomically. Subscribers are notified only if the profile
    /// changed. Returns whether it did.
    pub fn update(&self, f: impl FnOnce(&mut Profile)) -> bool {
        self.tx.send_if_modified(|profile| {
            let before = profile.clone();
            f(profile);
            *profile != before
        })
    }

    /// Move onboarding to `step`.
    pub fn set_step(&self, step: RegistrationStep) -> bool {
        self.update(|p| p.step = step)
    }

    /// Set the account credentials.
    pub fn set_account(
        &self,
        account: impl Into<String>,
        password_hash: impl Into<String>,
        password_hash_method: impl Into<String>,
    ) -> bool {
        let (account, hash, method) =
            (account.into(), password_hash.into(), password_hash_method.into());
        self.update(|p| {
            p.account = account;
            p.password_hash = hash;
            p.password_hash_method = method;
        })
    }

    /// Set the server domain.
    ///
    /// Changing domain invalidates every discovered component.
    pub fn set_domain(&self, domain: impl Into<String>, use_default_connectivity: bool) -> bool {
        let domain = domain.into();
        self.update(|p| {
            if p.domain != domain {
                p.components = ComponentAddresses::new();
                p.needs_update = true;
            }
            p.domain = domain;
            p.use_default_connectivity = use_default_connectivity;
        })
    }

    /// Merge a discovery run into the stored addresses in one update.
    ///
    /// Fills gaps, never erases, and records whether another run is needed.
    pub fn merge_components(&self, found: &ComponentAddresses) -> DiscoveryOutcome {
        let mut outcome = None;
        self.tx.send_if_modified(|profile| {
            let before = profile.clone();
            let result = discovery::apply(&mut profile.components, found);
            profile.needs_update = !result.complete;
            outcome = Some(result);
            *profile != before
        });

        outcome.unwrap_or_else(|| {
            let components = self.components();
            let missing = components.missing();
            DiscoveryOutcome { complete: missing.is_empty(), changed: Vec::new(), missing }
        })
    }
}
