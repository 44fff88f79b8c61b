//! Transport client seam.
//!
//! A [`TransportClient`] owns one XMPP connection and its [`ConnectionState`].
//! It reports every state transition, error and inbound stanza on an ordered
//! channel handed out once by [`TransportFactory::create`]. The session manager
//! consumes that channel from a single task, so events are observed in the
//! order the transport emitted them.

use std::sync::Arc;

use async_trait::async_trait;
use tether_core::{ConnectionParameters, ConnectionState, DiscoInfo};
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Presence availability sent by the local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Available for chat.
    Online,
    /// Temporarily away.
    Away,
    /// Going offline.
    Offline,
}

/// Inbound stanzas relayed to the presence/roster collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundStanza {
    /// A contact asks to subscribe to our presence.
    PresenceSubscribe {
        /// Requesting bare JID
        from: String,
    },
    /// A chat message.
    ChatMessage {
        /// Sender JID
        from: String,
        /// Message body
        body: String,
    },
    /// Anything else, identified by element name.
    Other {
        /// Element name
        name: String,
    },
}

/// Notifications emitted by a transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection state changed.
    StateChanged(ConnectionState),
    /// Generic protocol error.
    Error(String),
    /// Low-level connection error.
    ConnectionError(String),
    /// Stanza received.
    Stanza(InboundStanza),
}

/// One XMPP connection.
///
/// Implementations wrap an existing XMPP library. The session manager only
/// sequences calls against this contract.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Bare JID this transport signs in as.
    fn bare_jid(&self) -> String;

    /// Server domain.
    fn domain(&self) -> String;

    /// Open the connection.
    ///
    /// `domain_override` connects to a different host than the JID's domain
    /// (used when the profile asks for default connectivity).
    async fn connect(&self, domain_override: Option<&str>) -> Result<(), TransportError>;

    /// Re-open a dropped connection with the same parameters.
    async fn reconnect(&self) -> Result<(), TransportError>;

    /// Send our presence.
    async fn set_presence(&self, availability: Availability) -> Result<(), TransportError>;

    /// Child items of an entity (disco#items).
    async fn discover_items(&self, jid: &str) -> Result<Vec<String>, TransportError>;

    /// Feature set of an entity (disco#info).
    async fn discover_info(&self, jid: &str) -> Result<DiscoInfo, TransportError>;

    /// Close the connection and release resources.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// A freshly built transport and its event channel.
pub struct TransportHandle {
    /// The transport.
    pub client: Arc<dyn TransportClient>,
    /// Ordered events from the transport. Handed out exactly once.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Builds transports from profile parameters.
pub trait TransportFactory: Send + Sync {
    /// Construct a transport. Does not connect.
    fn create(&self, params: &ConnectionParameters) -> Result<TransportHandle, TransportError>;
}
