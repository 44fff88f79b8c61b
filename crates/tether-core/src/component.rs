//! Discovered server components.
//!
//! The server advertises companion services (legal identities, file upload,
//! ...) as child components. Service discovery writes their addresses here
//! and the session manager reads them to decide which sub-clients to bind.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Logical role of a server component.
///
/// Declaration order is the order sub-clients are created and disposed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Legal identities and smart contracts.
    LegalIdentities,
    /// HTTP file upload.
    FileUpload,
    /// Multi-user chat.
    MultiUserChat,
    /// Thing registry (device discovery).
    ThingRegistry,
    /// Provisioning (device, owner and token services).
    Provisioning,
    /// Financial ledger.
    Ledger,
    /// Event log sink.
    EventLog,
}

impl ServiceKind {
    /// Every kind, in declaration order.
    pub const ALL: [ServiceKind; 7] = [
        Self::LegalIdentities,
        Self::FileUpload,
        Self::MultiUserChat,
        Self::ThingRegistry,
        Self::Provisioning,
        Self::Ledger,
        Self::EventLog,
    ];

    /// Kinds that must be resolved before discovery counts as complete.
    pub const REQUIRED: [ServiceKind; 5] = [
        Self::LegalIdentities,
        Self::FileUpload,
        Self::EventLog,
        Self::MultiUserChat,
        Self::Ledger,
    ];

    /// Kinds that get a protocol-extension client bound to them.
    ///
    /// The event log is a plain sink address and has no client.
    pub fn has_sub_client(self) -> bool {
        self != Self::EventLog
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LegalIdentities => "legal-identities",
            Self::FileUpload => "file-upload",
            Self::MultiUserChat => "multi-user-chat",
            Self::ThingRegistry => "thing-registry",
            Self::Provisioning => "provisioning",
            Self::Ledger => "ledger",
            Self::EventLog => "event-log",
        };
        f.write_str(name)
    }
}

/// Component addresses keyed by service kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAddresses {
    addresses: BTreeMap<ServiceKind, String>,
    /// Largest upload the file-upload component accepts, in bytes.
    file_upload_max_size: Option<u64>,
}

impl ComponentAddresses {
    /// Create an empty address map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address for a kind. `None` if unknown or empty.
    pub fn get(&self, kind: ServiceKind) -> Option<&str> {
        self.addresses.get(&kind).map(String::as_str).filter(|a| !a.is_empty())
    }

    /// Record an address. Empty addresses are ignored.
    ///
    /// Returns `true` if the stored value changed.
    pub fn set(&mut self, kind: ServiceKind, address: impl Into<String>) -> bool {
        let address = address.into();
        if address.is_empty() || self.get(kind) == Some(address.as_str()) {
            return false;
        }
        self.addresses.insert(kind, address);
        true
    }

    /// Forget an address.
    pub fn clear(&mut self, kind: ServiceKind) -> bool {
        if kind == ServiceKind::FileUpload {
            self.file_upload_max_size = None;
        }
        self.addresses.remove(&kind).is_some()
    }

    /// Advertised file upload limit.
    pub fn file_upload_max_size(&self) -> Option<u64> {
        self.file_upload_max_size
    }

    /// Record the advertised file upload limit.
    pub fn set_file_upload_max_size(&mut self, max_size: u64) -> bool {
        let changed = self.file_upload_max_size != Some(max_size);
        self.file_upload_max_size = Some(max_size);
        changed
    }

    /// Fill gaps from `other` without erasing anything already known.
    ///
    /// A non-empty address in `other` replaces an existing different one
    /// (components can move), but an absent one never clears ours.
    /// Returns the kinds whose address changed.
    pub fn merge(&mut self, other: &ComponentAddresses) -> Vec<ServiceKind> {
        let mut changed = Vec::new();
        for (kind, address) in &other.addresses {
            if self.set(*kind, address.clone()) {
                changed.push(*kind);
            }
        }
        if let Some(max) = other.file_upload_max_size {
            self.set_file_upload_max_size(max);
        }
        changed
    }

    /// Required kinds that are still unresolved.
    ///
    /// File upload also counts as missing until a max size is known.
    pub fn missing(&self) -> Vec<ServiceKind> {
        ServiceKind::REQUIRED
            .into_iter()
            .filter(|kind| match kind {
                ServiceKind::FileUpload => {
                    self.get(*kind).is_none() || self.file_upload_max_size.is_none()
                },
                _ => self.get(*kind).is_none(),
            })
            .collect()
    }

    /// All required kinds are resolved.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Iterate known (non-empty) addresses in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ServiceKind, &str)> {
        self.addresses.iter().filter(|(_, a)| !a.is_empty()).map(|(k, a)| (*k, a.as_str()))
    }
}
