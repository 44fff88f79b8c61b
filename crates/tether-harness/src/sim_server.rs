//! Simulated XMPP server directory.
//!
//! `SimServer` answers the two discovery queries a session issues: the item
//! list of the server domain and the feature set of each item. Tests mutate
//! the directory between runs to model components appearing, disappearing or
//! failing.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tether_client::TransportError;
use tether_core::{DiscoInfo, ServiceKind, discovery};

struct Directory {
    components: BTreeMap<String, DiscoInfo>,
    failing: BTreeSet<String>,
    info_queries: usize,
}

/// In-memory server directory for one domain.
pub struct SimServer {
    domain: String,
    directory: Mutex<Directory>,
}

impl SimServer {
    /// Server with no components.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            directory: Mutex::new(Directory {
                components: BTreeMap::new(),
                failing: BTreeSet::new(),
                info_queries: 0,
            }),
        }
    }

    /// Server hosting one component of every kind.
    pub fn with_standard_components(domain: impl Into<String>) -> Self {
        let server = Self::new(domain);
        for kind in ServiceKind::ALL {
            server.add_kind(kind);
        }
        server
    }

    /// Server domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Host a component at `jid`.
    pub fn add_component(&self, jid: impl Into<String>, info: DiscoInfo) {
        self.lock().components.insert(jid.into(), info);
    }

    /// Host the standard component for `kind`. Returns its JID.
    pub fn add_kind(&self, kind: ServiceKind) -> String {
        let (jid, info) = standard_component(&self.domain, kind);
        self.add_component(jid.clone(), info);
        jid
    }

    /// Stop hosting the component at `jid`.
    pub fn remove_component(&self, jid: &str) {
        self.lock().components.remove(jid);
    }

    /// Make info queries for `jid` fail.
    pub fn fail_info(&self, jid: impl Into<String>) {
        self.lock().failing.insert(jid.into());
    }

    /// Child items of `jid`. Only the server domain has children.
    pub fn items(&self, jid: &str) -> Vec<String> {
        if jid != self.domain {
            return Vec::new();
        }
        self.lock().components.keys().cloned().collect()
    }

    /// Feature set of `jid`.
    ///
    /// # Errors
    ///
    /// - `TransportError::Protocol` if the component is unknown or set to fail
    pub fn info(&self, jid: &str) -> Result<DiscoInfo, TransportError> {
        let mut directory = self.lock();
        directory.info_queries += 1;
        if directory.failing.contains(jid) {
            return Err(TransportError::Protocol(format!("internal-server-error from {jid}")));
        }
        directory
            .components
            .get(jid)
            .cloned()
            .ok_or_else(|| TransportError::Protocol(format!("item-not-found: {jid}")))
    }

    /// Info queries answered so far, failed ones included.
    pub fn info_queries(&self) -> usize {
        self.lock().info_queries
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// JID and feature set of the standard component for `kind`.
pub fn standard_component(domain: &str, kind: ServiceKind) -> (String, DiscoInfo) {
    let (host, info) = match kind {
        ServiceKind::LegalIdentities => {
            ("legal", DiscoInfo::with_features([discovery::NS_LEGAL_IDENTITIES]))
        },
        ServiceKind::FileUpload => (
            "upload",
            DiscoInfo::with_features([discovery::NS_HTTP_FILE_UPLOAD])
                .with_field(discovery::FIELD_MAX_FILE_SIZE, "10485760"),
        ),
        ServiceKind::MultiUserChat => ("muc", DiscoInfo::with_features([discovery::NS_MUC])),
        ServiceKind::ThingRegistry => {
            ("registry", DiscoInfo::with_features([discovery::NS_THING_REGISTRY]))
        },
        ServiceKind::Provisioning => (
            "provisioning",
            DiscoInfo::with_features([
                discovery::NS_PROVISIONING_DEVICE,
                discovery::NS_PROVISIONING_OWNER,
                discovery::NS_PROVISIONING_TOKEN,
            ]),
        ),
        ServiceKind::Ledger => ("edaler", DiscoInfo::with_features([discovery::NS_LEDGER])),
        ServiceKind::EventLog => ("log", DiscoInfo::with_features([discovery::NS_EVENT_LOG])),
    };
    (format!("{host}.{domain}"), info)
}
