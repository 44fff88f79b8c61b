//! Live sub-client set.
//!
//! Invariant: a client exists for kind K iff the profile knows a non-empty
//! address for K and a transport exists. [`SubClientRegistry::refresh`]
//! restores the invariant after discovery changes the addresses;
//! [`SubClientRegistry::dispose_all`] empties the set when the transport goes.

use std::{collections::BTreeMap, sync::Arc};

use tether_core::{ComponentAddresses, ServiceKind, decision::binding_mismatches};

use crate::{
    error::SubClientError,
    subclient::{SubClient, SubClientFactory, SubClientRequest},
    transport::TransportClient,
};

/// What a refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Kinds that got a client for the first time.
    pub created: Vec<ServiceKind>,
    /// Kinds whose client was rebound to a new address.
    pub replaced: Vec<ServiceKind>,
    /// Kinds whose client was dropped because the address disappeared.
    pub removed: Vec<ServiceKind>,
    /// Kinds whose client could not be built (non-fatal).
    pub failed: Vec<ServiceKind>,
}

impl RefreshReport {
    /// Nothing changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.replaced.is_empty()
            && self.removed.is_empty()
            && self.failed.is_empty()
    }
}

/// Live sub-clients keyed by kind, iterated in [`ServiceKind`] order.
#[derive(Default)]
pub struct SubClientRegistry {
    clients: BTreeMap<ServiceKind, Arc<dyn SubClient>>,
}

impl SubClientRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for `kind`, if any.
    pub fn get(&self, kind: ServiceKind) -> Option<Arc<dyn SubClient>> {
        self.clients.get(&kind).cloned()
    }

    /// Number of live clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// No live clients.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Address each live client is bound to.
    pub fn bound(&self) -> BTreeMap<ServiceKind, String> {
        self.clients
            .iter()
            .map(|(kind, client)| (*kind, client.component_address().to_string()))
            .collect()
    }

    /// Rebind clients so they match `addresses`.
    ///
    /// Clients already bound to the right address are left alone. Creation
    /// failures are logged and skipped. Every other kind is still bound when
    /// one is refused keys; the refusal is returned once the pass is done.
    ///
    /// # Errors
    ///
    /// - `SubClientError::KeyGenerationNotPermitted` if the legal identity
    ///   client needs new keys and `can_create_keys` is false
    pub async fn refresh(
        &mut self,
        transport: &Arc<dyn TransportClient>,
        addresses: &ComponentAddresses,
        factory: &dyn SubClientFactory,
        can_create_keys: bool,
    ) -> Result<RefreshReport, SubClientError> {
        let mut report = RefreshReport::default();
        let mut refused = None;

        for kind in binding_mismatches(&self.bound(), addresses) {
            let previous = self.clients.remove(&kind);
            let had_previous = previous.is_some();
            if let Some(client) = previous {
                dispose_logged(client).await;
            }

            let Some(address) = addresses.get(kind) else {
                report.removed.push(kind);
                continue;
            };

            let request = SubClientRequest {
                kind,
                address,
                transport: Arc::clone(transport),
                file_upload_max_size: addresses.file_upload_max_size(),
                can_create_keys,
            };

            match factory.create(request) {
                Ok(client) => {
                    tracing::debug!(%kind, address, "sub-client bound");
                    self.clients.insert(kind, client);
                    if had_previous {
                        report.replaced.push(kind);
                    } else {
                        report.created.push(kind);
                    }
                },
                Err(e) if e.is_fatal() => {
                    tracing::error!(%kind, error = %e, "sub-client creation refused");
                    report.failed.push(kind);
                    refused.get_or_insert(e);
                },
                Err(e) => {
                    tracing::warn!(%kind, error = %e, "sub-client creation failed");
                    report.failed.push(kind);
                },
            }
        }

        match refused {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Dispose every client in kind order.
    ///
    /// Every client is disposed exactly once; a failing client does not stop
    /// the rest. Returns the failures.
    pub async fn dispose_all(&mut self) -> Vec<SubClientError> {
        let mut failures = Vec::new();
        let clients = std::mem::take(&mut self.clients);

        for (kind, client) in clients {
            if let Err(e) = client.dispose().await {
                tracing::warn!(%kind, error = %e, "sub-client dispose failed");
                failures.push(e);
            }
        }

        failures
    }
}

async fn dispose_logged(client: Arc<dyn SubClient>) {
    let kind = client.kind();
    if let Err(e) = client.dispose().await {
        tracing::warn!(%kind, error = %e, "sub-client dispose failed during rebind");
    }
}
