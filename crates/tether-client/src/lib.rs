//! Client
//!
//! Seams between the session manager and the protocol libraries it drives.
//! The XMPP wire protocol is not implemented here: a concrete XMPP library is
//! wrapped behind [`TransportClient`], and each protocol extension behind
//! [`SubClient`].
//!
//! # Components
//!
//! - [`TransportClient`] / [`TransportFactory`]: One XMPP connection and how
//!   to build it from [`tether_core::ConnectionParameters`]
//! - [`TransportEvent`]: Ordered state, error and stanza notifications
//! - [`SubClient`] / [`SubClientFactory`]: Protocol-extension clients bound to
//!   discovered components
//! - [`SubClientRegistry`]: The live set of sub-clients
//! - [`StandardSubClientFactory`]: Default sub-clients, with a [`KeyRing`] for
//!   legal identities

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod keyring;
mod registry;
mod subclient;
mod transport;

pub use error::{SubClientError, TransportError};
pub use keyring::KeyRing;
pub use registry::{RefreshReport, SubClientRegistry};
pub use subclient::{
    ComponentClient, FileUploadClient, LegalIdentityClient, StandardSubClientFactory, SubClient,
    SubClientFactory, SubClientRequest,
};
pub use tether_core::{ComponentAddresses, ConnectionParameters, ConnectionState, ServiceKind};
pub use transport::{
    Availability, InboundStanza, TransportClient, TransportEvent, TransportFactory,
    TransportHandle,
};
