//! Simulated transports.
//!
//! `SimTransport` walks through the XMPP connection states on `connect()` and
//! `reconnect()` according to the factory's [`ConnectBehavior`], after a
//! configurable latency on tokio's clock. Tests drive it further with the
//! `push_*` hooks and read its call counters.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tether_client::{
    Availability, InboundStanza, TransportClient, TransportError, TransportEvent,
    TransportFactory, TransportHandle,
};
use tether_core::{ConnectionParameters, ConnectionState, DiscoInfo};
use tokio::sync::mpsc;

use crate::sim_server::SimServer;

/// Default handshake latency.
pub const DEFAULT_CONNECT_LATENCY: Duration = Duration::from_millis(50);

/// How a simulated handshake ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Every handshake state, ending in `Connected`.
    Succeed,
    /// Reaches `Authenticating`, then fails with `not-authorized`.
    RejectCredentials,
    /// Fails before the stream opens with a connection error.
    Unreachable(String),
    /// Stays in `Connecting`.
    Hang,
}

const HANDSHAKE: [ConnectionState; 4] = [
    ConnectionState::StreamNegotiation,
    ConnectionState::StreamOpened,
    ConnectionState::StartingEncryption,
    ConnectionState::Authenticating,
];

struct Network {
    server: Arc<SimServer>,
    behavior: Mutex<ConnectBehavior>,
    latency: Mutex<Duration>,
    disconnect_latency: Mutex<Duration>,
}

impl Network {
    fn behavior(&self) -> ConnectBehavior {
        lock(&self.behavior).clone()
    }

    fn latency(&self) -> Duration {
        *lock(&self.latency)
    }

    fn disconnect_latency(&self) -> Duration {
        *lock(&self.disconnect_latency)
    }
}

/// One simulated XMPP connection.
pub struct SimTransport {
    params: ConnectionParameters,
    network: Arc<Network>,
    state: Mutex<ConnectionState>,
    events: mpsc::UnboundedSender<TransportEvent>,
    connects: AtomicUsize,
    reconnects: AtomicUsize,
    disconnects: AtomicUsize,
    presences: Mutex<Vec<Availability>>,
}

impl SimTransport {
    /// Parameters the transport was built with.
    pub fn params(&self) -> &ConnectionParameters {
        &self.params
    }

    /// Times `connect()` was called.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Times `reconnect()` was called.
    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Times `disconnect()` was called.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Presences sent, in order.
    pub fn presences(&self) -> Vec<Availability> {
        lock(&self.presences).clone()
    }

    /// Move to `state` and report it.
    pub fn push_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
        self.emit(TransportEvent::StateChanged(state));
    }

    /// Report a protocol error.
    pub fn push_error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    /// Report a connection error.
    pub fn push_connection_error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::ConnectionError(message.into()));
    }

    /// Deliver an inbound stanza.
    pub fn push_stanza(&self, stanza: InboundStanza) {
        self.emit(TransportEvent::Stanza(stanza));
    }

    fn emit(&self, event: TransportEvent) {
        // Receiver is gone once the session retired this transport.
        let _ = self.events.send(event);
    }

    fn require_connected(&self) -> Result<(), TransportError> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            _ => Err(TransportError::Closed),
        }
    }

    async fn handshake(&self) -> Result<(), TransportError> {
        self.push_state(ConnectionState::Connecting);
        tokio::time::sleep(self.network.latency()).await;

        match self.network.behavior() {
            ConnectBehavior::Succeed => {
                for state in HANDSHAKE {
                    self.push_state(state);
                }
                self.push_state(ConnectionState::Connected);
                Ok(())
            },
            ConnectBehavior::RejectCredentials => {
                for state in HANDSHAKE {
                    self.push_state(state);
                }
                self.push_error("not-authorized");
                self.push_state(ConnectionState::Error);
                Ok(())
            },
            ConnectBehavior::Unreachable(reason) => {
                self.push_connection_error(reason.clone());
                self.push_state(ConnectionState::Error);
                Err(TransportError::Connection(reason))
            },
            ConnectBehavior::Hang => Ok(()),
        }
    }
}

#[async_trait]
impl TransportClient for SimTransport {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn bare_jid(&self) -> String {
        format!("{}@{}", self.params.account, self.params.domain)
    }

    fn domain(&self) -> String {
        self.params.domain.clone()
    }

    async fn connect(&self, domain_override: Option<&str>) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(domain = %self.params.domain, ?domain_override, "sim connect");
        self.handshake().await
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(domain = %self.params.domain, "sim reconnect");
        self.handshake().await
    }

    async fn set_presence(&self, availability: Availability) -> Result<(), TransportError> {
        lock(&self.presences).push(availability);
        self.require_connected()
    }

    async fn discover_items(&self, jid: &str) -> Result<Vec<String>, TransportError> {
        self.require_connected()?;
        Ok(self.network.server.items(jid))
    }

    async fn discover_info(&self, jid: &str) -> Result<DiscoInfo, TransportError> {
        self.require_connected()?;
        self.network.server.info(jid)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let latency = self.network.disconnect_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.push_state(ConnectionState::Offline);
        Ok(())
    }
}

/// Builds [`SimTransport`]s against one [`SimServer`] and keeps them all.
pub struct SimTransportFactory {
    network: Arc<Network>,
    built: Mutex<Vec<Arc<SimTransport>>>,
    refuse: Mutex<Option<String>>,
}

impl SimTransportFactory {
    /// Factory whose transports succeed after the default latency.
    pub fn new(server: Arc<SimServer>) -> Self {
        Self {
            network: Arc::new(Network {
                server,
                behavior: Mutex::new(ConnectBehavior::Succeed),
                latency: Mutex::new(DEFAULT_CONNECT_LATENCY),
                disconnect_latency: Mutex::new(Duration::ZERO),
            }),
            built: Mutex::new(Vec::new()),
            refuse: Mutex::new(None),
        }
    }

    /// Behaviour of every later handshake, on old and new transports alike.
    pub fn set_behavior(&self, behavior: ConnectBehavior) {
        *lock(&self.network.behavior) = behavior;
    }

    /// Handshake latency.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.network.latency) = latency;
    }

    /// Time a disconnect takes before it counts. Zero by default.
    pub fn set_disconnect_latency(&self, latency: Duration) {
        *lock(&self.network.disconnect_latency) = latency;
    }

    /// Make `create` fail with `reason` until cleared with `None`.
    pub fn refuse_construction(&self, reason: Option<String>) {
        *lock(&self.refuse) = reason;
    }

    /// Number of transports constructed.
    pub fn created(&self) -> usize {
        lock(&self.built).len()
    }

    /// Every transport constructed, oldest first.
    pub fn transports(&self) -> Vec<Arc<SimTransport>> {
        lock(&self.built).clone()
    }

    /// Most recently constructed transport.
    pub fn latest(&self) -> Option<Arc<SimTransport>> {
        lock(&self.built).last().cloned()
    }
}

impl TransportFactory for SimTransportFactory {
    fn create(&self, params: &ConnectionParameters) -> Result<TransportHandle, TransportError> {
        if let Some(reason) = lock(&self.refuse).clone() {
            return Err(TransportError::Connection(reason));
        }

        let (events, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(SimTransport {
            params: params.clone(),
            network: Arc::clone(&self.network),
            state: Mutex::new(ConnectionState::Offline),
            events,
            connects: AtomicUsize::new(0),
            reconnects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            presences: Mutex::new(Vec::new()),
        });
        lock(&self.built).push(Arc::clone(&transport));

        Ok(TransportHandle { client: transport, events: rx })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
