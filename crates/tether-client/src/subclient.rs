//! Protocol-extension sub-clients.
//!
//! Each sub-client is bound to one discovered component address and to the
//! live transport. The default implementations carry the per-kind state the
//! session layer cares about (upload limit, identity key) and leave protocol
//! details to the wrapped libraries.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use tether_core::ServiceKind;

use crate::{error::SubClientError, keyring::KeyRing, transport::TransportClient};

/// A protocol-extension client bound to one server component.
#[async_trait]
pub trait SubClient: Send + Sync {
    /// Service kind this client implements.
    fn kind(&self) -> ServiceKind;

    /// Component address the client is bound to.
    fn component_address(&self) -> &str;

    /// Release the client. Called exactly once, on teardown or rebinding.
    async fn dispose(&self) -> Result<(), SubClientError>;
}

/// Everything a factory needs to build one sub-client.
pub struct SubClientRequest<'a> {
    /// Kind to build.
    pub kind: ServiceKind,
    /// Component address to bind to.
    pub address: &'a str,
    /// Live transport.
    pub transport: Arc<dyn TransportClient>,
    /// Upload limit (file upload only).
    pub file_upload_max_size: Option<u64>,
    /// Registration step allows generating signing keys.
    pub can_create_keys: bool,
}

/// Builds sub-clients.
pub trait SubClientFactory: Send + Sync {
    /// Construct a sub-client for `request.kind`.
    fn create(&self, request: SubClientRequest<'_>) -> Result<Arc<dyn SubClient>, SubClientError>;
}

/// Generic component client: MUC, thing registry, provisioning, ledger.
pub struct ComponentClient {
    kind: ServiceKind,
    address: String,
    transport: Arc<dyn TransportClient>,
    disposed: AtomicBool,
}

impl ComponentClient {
    /// Bind a component client.
    pub fn new(kind: ServiceKind, address: String, transport: Arc<dyn TransportClient>) -> Self {
        Self { kind, address, transport, disposed: AtomicBool::new(false) }
    }

    /// Transport this client talks through.
    pub fn transport(&self) -> &Arc<dyn TransportClient> {
        &self.transport
    }
}

#[async_trait]
impl SubClient for ComponentClient {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    fn component_address(&self) -> &str {
        &self.address
    }

    async fn dispose(&self) -> Result<(), SubClientError> {
        mark_disposed(&self.disposed, self.kind)
    }
}

/// HTTP file upload client.
pub struct FileUploadClient {
    address: String,
    max_size: Option<u64>,
    disposed: AtomicBool,
}

impl FileUploadClient {
    /// Bind a file upload client.
    pub fn new(address: String, max_size: Option<u64>) -> Self {
        Self { address, max_size, disposed: AtomicBool::new(false) }
    }

    /// Advertised upload limit.
    pub fn max_size(&self) -> Option<u64> {
        self.max_size
    }

    /// A file of `len` bytes is accepted. Unknown limits accept nothing.
    pub fn accepts(&self, len: u64) -> bool {
        self.max_size.is_some_and(|max| len <= max)
    }
}

#[async_trait]
impl SubClient for FileUploadClient {
    fn kind(&self) -> ServiceKind {
        ServiceKind::FileUpload
    }

    fn component_address(&self) -> &str {
        &self.address
    }

    async fn dispose(&self) -> Result<(), SubClientError> {
        mark_disposed(&self.disposed, ServiceKind::FileUpload)
    }
}

/// Legal identity and contracts client.
pub struct LegalIdentityClient {
    address: String,
    public_key: VerifyingKey,
    disposed: AtomicBool,
}

impl LegalIdentityClient {
    /// Bind a legal identity client using `public_key` for identity
    /// applications.
    pub fn new(address: String, public_key: VerifyingKey) -> Self {
        Self { address, public_key, disposed: AtomicBool::new(false) }
    }

    /// Identity public key.
    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }
}

#[async_trait]
impl SubClient for LegalIdentityClient {
    fn kind(&self) -> ServiceKind {
        ServiceKind::LegalIdentities
    }

    fn component_address(&self) -> &str {
        &self.address
    }

    async fn dispose(&self) -> Result<(), SubClientError> {
        mark_disposed(&self.disposed, ServiceKind::LegalIdentities)
    }
}

fn mark_disposed(flag: &AtomicBool, kind: ServiceKind) -> Result<(), SubClientError> {
    if flag.swap(true, Ordering::AcqRel) {
        return Err(SubClientError::AlreadyDisposed(kind));
    }
    Ok(())
}

/// Factory for the default sub-clients.
pub struct StandardSubClientFactory {
    keys: Arc<KeyRing>,
}

impl StandardSubClientFactory {
    /// Factory drawing identity keys from `keys`.
    pub fn new(keys: Arc<KeyRing>) -> Self {
        Self { keys }
    }
}

impl SubClientFactory for StandardSubClientFactory {
    fn create(&self, request: SubClientRequest<'_>) -> Result<Arc<dyn SubClient>, SubClientError> {
        let address = request.address.to_string();

        match request.kind {
            ServiceKind::LegalIdentities => {
                let public_key = self.keys.public_key(request.can_create_keys)?;
                Ok(Arc::new(LegalIdentityClient::new(address, public_key)))
            },
            ServiceKind::FileUpload => {
                Ok(Arc::new(FileUploadClient::new(address, request.file_upload_max_size)))
            },
            ServiceKind::MultiUserChat
            | ServiceKind::ThingRegistry
            | ServiceKind::Provisioning
            | ServiceKind::Ledger => {
                Ok(Arc::new(ComponentClient::new(request.kind, address, request.transport)))
            },
            ServiceKind::EventLog => Err(SubClientError::Creation {
                kind: ServiceKind::EventLog,
                reason: "event log is an address, not a client".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispose_is_reported_once() {
        let client = FileUploadClient::new("upload.example.org".into(), Some(1024));

        assert!(client.dispose().await.is_ok());
        assert_eq!(
            client.dispose().await,
            Err(SubClientError::AlreadyDisposed(ServiceKind::FileUpload))
        );
    }

    #[test]
    fn upload_limit_is_enforced() {
        let client = FileUploadClient::new("upload.example.org".into(), Some(1024));
        assert!(client.accepts(1024));
        assert!(!client.accepts(1025));

        let unknown = FileUploadClient::new("upload.example.org".into(), None);
        assert!(!unknown.accepts(1));
    }
}
