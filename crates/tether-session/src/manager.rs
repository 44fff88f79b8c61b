//! Session manager.
//!
//! Owns at most one live session: a transport, the sub-clients bound to it
//! and the parameters it was built with. Every trigger (explicit load, a
//! profile change, a reconnect tick) funnels into the same creation routine,
//! which asks [`decision::decide`] whether to reuse, refresh or rebuild.
//!
//! # Tasks
//!
//! Each live transport gets two tasks, both aborted on teardown:
//!
//! - the event pump, the only consumer of the transport's event channel. It
//!   updates the observed status, raises the state event and routes inbound
//!   stanzas, strictly in the order the transport emitted them;
//! - the reconnect timer, which checks staleness every interval and calls
//!   `reconnect()` when stale and the network is reachable. Every observed
//!   `Connected` restarts its interval.
//!
//! Post-connect discovery runs on the supervised background set. The profile
//! watcher is stopped cooperatively on unload, so a creation it started
//! finishes before teardown begins. Releasing a session runs on its own
//! task and completes even if the caller is cancelled.
//!
//! A key refusal while binding sub-clients tears the whole session down,
//! whichever trigger asked for the binding.
//!
//! # Locking
//!
//! The session slot is a `tokio::sync::Mutex` held across transport I/O.
//! The observed status sits behind a short synchronous lock that is never
//! held across an await or while state handlers run. The event pump never
//! takes the session lock.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    sync::{
        Arc, Mutex as SyncMutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use tether_client::{
    Availability, InboundStanza, RefreshReport, SubClient, SubClientError, SubClientFactory,
    SubClientRegistry, TransportClient, TransportEvent, TransportFactory, TransportHandle,
};
use tether_core::{
    ComponentAddresses, ConnectionParameters, ConnectionState, RecreateDecision, ServiceKind,
    StaleReason,
    decision::{self, LiveView},
    env::Environment,
};
use tokio::{
    sync::{Mutex, Notify, mpsc},
    task::{AbortHandle, JoinHandle},
};

use crate::{
    config::SessionConfig,
    discovery::ServiceDiscovery,
    error::SessionError,
    events::{EventBus, HandlerError, SubscriptionId},
    probe::{self, ConnectOutcome, ConnectProbe},
    profile::{Profile, ProfileStore},
    reachability::NetworkReachability,
    status::{self, Status},
    tasks::{Supervisor, TaskFailure},
    timeout::with_timeout,
};

/// Collaborators injected into the session manager.
pub struct SessionDeps {
    /// Profile values and change notifications.
    pub profile: Arc<ProfileStore>,
    /// Builds transports.
    pub transports: Arc<dyn TransportFactory>,
    /// Builds sub-clients.
    pub sub_clients: Arc<dyn SubClientFactory>,
    /// Device connectivity.
    pub reachability: Arc<dyn NetworkReachability>,
    /// Receives inbound stanzas. Full or closed sinks drop stanzas.
    pub inbound: Option<mpsc::Sender<InboundStanza>>,
}

/// What one run of the creation routine did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationOutcome {
    /// Another creation was running; nothing was done.
    AlreadyInProgress,
    /// The profile does not permit a connection. Any live session was torn
    /// down.
    NotPermitted,
    /// The live session matches the profile.
    Reused,
    /// Sub-clients were rebound; the transport was kept.
    Refreshed,
    /// A session was created where none existed.
    Created,
    /// The live session was torn down and rebuilt.
    Recreated,
    /// The transport could not be built. Recorded as a connection error.
    Failed,
}

struct LiveSession {
    params: ConnectionParameters,
    transport: Arc<dyn TransportClient>,
    sub_clients: SubClientRegistry,
    tasks: Vec<AbortHandle>,
}

impl LiveSession {
    fn stop_tasks(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct Watcher {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

struct CreationGuard<'a>(&'a AtomicBool);

impl<'a> CreationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner<E: Environment> {
    env: E,
    config: SessionConfig,
    deps: SessionDeps,
    session: Mutex<Option<LiveSession>>,
    creating: AtomicBool,
    epoch: AtomicU64,
    status: SyncMutex<Status<E::Instant>>,
    state_events: EventBus<ConnectionState>,
    background: Supervisor,
    watcher: SyncMutex<Option<Watcher>>,
}

/// Creates, maintains and tears down the XMPP session.
///
/// Cheap to clone; clones share the same session.
pub struct SessionManager<E: Environment> {
    inner: Arc<Inner<E>>,
}

impl<E: Environment> Clone for SessionManager<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E: Environment> SessionManager<E> {
    /// Manager with no session. Nothing starts until [`Self::load`].
    pub fn new(env: E, config: SessionConfig, deps: SessionDeps) -> Self {
        let status = Status::new(env.now());
        Self {
            inner: Arc::new(Inner {
                env,
                config,
                deps,
                session: Mutex::new(None),
                creating: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                status: SyncMutex::new(status),
                state_events: EventBus::new(),
                background: Supervisor::new(),
                watcher: SyncMutex::new(None),
            }),
        }
    }

    /// Start following the profile and connect if it permits.
    ///
    /// Idempotent. When configured to wait, returns whether `Connected` was
    /// reached within the connect timeout. Network failures are logged and
    /// reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// - `SessionError::KeyGenerationNotPermitted` if a sub-client needs new
    ///   signing keys at a registration step that forbids generating them
    pub async fn load(&self) -> Result<bool, SessionError> {
        self.inner.start_watcher();

        let profile = self.inner.deps.profile.snapshot();
        if !profile.permits_connection() {
            tracing::debug!(step = ?profile.step, "profile does not permit a connection yet");
            return Ok(false);
        }

        match self.inner.ensure_session(profile.step.permits_key_generation()).await {
            Ok(outcome) => tracing::debug!(?outcome, domain = %profile.domain, "load"),
            Err(e) if e.is_fatal() => {
                tracing::error!(domain = %profile.domain, error = %e, "load refused");
                return Err(e);
            },
            Err(e) => {
                tracing::warn!(domain = %profile.domain, error = %e, "load failed");
                return Ok(false);
            },
        }

        if !self.inner.config.wait_on_load {
            return Ok(self.is_online());
        }

        let connected = self.wait_for_connected(self.inner.config.connect_timeout).await;
        if !connected {
            tracing::warn!(
                domain = %profile.domain,
                timeout = ?self.inner.config.connect_timeout,
                "not connected after load"
            );
        }
        Ok(connected)
    }

    /// Stop following the profile and tear the session down.
    ///
    /// A graceful unload (`fast == false`) first sends an offline presence,
    /// bounded by the configured timeout. A session update already started
    /// by a profile change completes first. Errors are logged and swallowed.
    pub async fn unload(&self, fast: bool) {
        let watcher = lock(&self.inner.watcher).take();
        if let Some(Watcher { stop, task }) = watcher {
            stop.notify_one();
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "profile watcher ended abnormally");
            }
        }

        let mut slot = self.inner.session.lock().await;
        self.inner.teardown(&mut slot, !fast).await;
    }

    /// Wait until the session is `Connected`.
    ///
    /// Returns `true` at once if already connected, `false` on timeout. May be
    /// called before any transport exists.
    pub async fn wait_for_connected(&self, timeout: Duration) -> bool {
        let mut states = self.inner.state_events.subscribe();
        if self.state().is_connected() {
            return true;
        }

        let connected = async {
            while let Some(state) = states.recv().await {
                if state.is_connected() {
                    return true;
                }
            }
            false
        };

        with_timeout(&self.inner.env, timeout, connected).await.unwrap_or(false)
    }

    /// Channel receiving every observed state transition, in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionState> {
        self.inner.state_events.subscribe()
    }

    /// Call `handler` on every observed state transition.
    ///
    /// Handlers run outside every session lock. Errors are logged.
    pub fn on_state_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ConnectionState) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.state_events.on(handler)
    }

    /// Remove a state handler.
    pub fn remove_state_handler(&self, id: SubscriptionId) -> bool {
        self.inner.state_events.off(id)
    }

    /// Run service discovery against `client`, or the live transport.
    ///
    /// Returns whether every required component is now known. Sub-clients are
    /// refreshed when discovery found new addresses.
    pub async fn discover_services(&self, client: Option<Arc<dyn TransportClient>>) -> bool {
        match self.inner.discover_services(client).await {
            Ok(complete) => complete,
            Err(e) => {
                let domain = self.inner.deps.profile.snapshot().domain;
                if e.is_fatal() {
                    tracing::error!(%domain, error = %e, "service discovery aborted");
                } else {
                    tracing::warn!(%domain, error = %e, "service discovery failed");
                }
                false
            },
        }
    }

    /// Run the creation routine.
    ///
    /// Returns `AlreadyInProgress` without waiting if another call is
    /// running.
    ///
    /// # Errors
    ///
    /// - `SessionError::KeyGenerationNotPermitted` if a sub-client needs new
    ///   signing keys and `can_create_keys` is false. The session is torn
    ///   down.
    pub async fn ensure_session(
        &self,
        can_create_keys: bool,
    ) -> Result<CreationOutcome, SessionError> {
        self.inner.ensure_session(can_create_keys).await
    }

    /// Rebind sub-clients to the profile's current addresses.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoTransport` if no session is live
    /// - `SessionError::KeyGenerationNotPermitted` if new keys are needed and
    ///   the registration step forbids them. The session is torn down.
    pub async fn refresh_sub_clients(&self) -> Result<RefreshReport, SessionError> {
        self.inner.refresh_sub_clients().await
    }

    /// Check `params` with a throwaway transport.
    ///
    /// The live session is not touched. With `discover` set, a successful
    /// sign-in probe also runs service discovery and records the results in
    /// the profile when `params` is for the profile's domain.
    pub async fn try_connect(
        &self,
        params: &ConnectionParameters,
        probe: ConnectProbe,
        timeout: Duration,
        discover: bool,
    ) -> ConnectOutcome {
        let domain = params.domain.as_str();
        let handle = match self.inner.deps.transports.create(params) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(domain, error = %e, "probe transport construction failed");
                return ConnectOutcome::failure(e.to_string());
            },
        };

        let client = Arc::clone(&handle.client);
        let domain_override = params.use_default_connectivity.then_some(domain);
        let mut outcome =
            probe::run(&self.inner.env, handle, domain_override, probe, timeout).await;

        if outcome.succeeded && discover && probe == ConnectProbe::SignIn {
            let profile = &self.inner.deps.profile;
            if profile.snapshot().domain == domain {
                let env = self.inner.env.clone();
                let discovery = ServiceDiscovery::new(env, self.inner.config.discovery_timeout);
                match discovery.run(client.as_ref(), profile).await {
                    Ok(found) => outcome.discovery = Some(found),
                    Err(e) => tracing::warn!(domain, error = %e, "probe discovery failed"),
                }
            } else {
                tracing::debug!(domain, "probe domain differs from profile, discovery skipped");
            }
        }

        if let Err(e) = client.disconnect().await {
            tracing::debug!(domain, error = %e, "probe disconnect failed");
        }

        outcome
    }

    /// Last observed connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock_status().state
    }

    /// Session is `Connected`.
    pub fn is_online(&self) -> bool {
        self.state().is_connected()
    }

    /// Bare JID from the profile, if the account and domain form a valid one.
    pub fn bare_jid(&self) -> Option<String> {
        self.inner.deps.profile.connection_parameters().bare_jid().ok().map(|jid| jid.to_string())
    }

    /// Last protocol error since the last `Connecting`.
    pub fn latest_error(&self) -> Option<String> {
        self.inner.lock_status().latest_error.clone()
    }

    /// Last connection error since the last `Connecting`.
    pub fn latest_connection_error(&self) -> Option<String> {
        self.inner.lock_status().latest_connection_error.clone()
    }

    /// User-facing error text. Prefers the connection error when both are set
    /// and differ.
    pub fn error_banner(&self) -> Option<String> {
        let observed = self.inner.lock_status();
        status::error_banner(
            observed.latest_error.as_deref(),
            observed.latest_connection_error.as_deref(),
        )
    }

    /// Live transport, if any.
    pub async fn transport(&self) -> Option<Arc<dyn TransportClient>> {
        self.inner.current_transport().await
    }

    /// Live sub-client for `kind`, if any.
    pub async fn sub_client(&self, kind: ServiceKind) -> Option<Arc<dyn SubClient>> {
        self.inner.session.lock().await.as_ref().and_then(|s| s.sub_clients.get(kind))
    }

    /// Background tasks that failed so far.
    pub fn task_failures(&self) -> Vec<TaskFailure> {
        self.inner.background.failures()
    }

    /// Wait for the background tasks spawned so far to finish.
    pub async fn settle(&self) {
        self.inner.background.settle().await;
    }
}

impl<E: Environment> Inner<E> {
    fn lock_status(&self) -> MutexGuard<'_, Status<E::Instant>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn can_create_keys(&self) -> bool {
        self.deps.profile.step().permits_key_generation()
    }

    fn staleness(&self) -> Option<StaleReason> {
        let status = self.lock_status();
        let observed = Some((status.state, status.since));
        decision::staleness(observed, self.env.now(), self.config.stale_after)
    }

    fn map_sub_client_error(&self, e: SubClientError) -> SessionError {
        if e.is_fatal() {
            SessionError::KeyGenerationNotPermitted { step: self.deps.profile.step() }
        } else {
            SessionError::SubClient(e)
        }
    }

    async fn current_transport(&self) -> Option<Arc<dyn TransportClient>> {
        self.session.lock().await.as_ref().map(|s| Arc::clone(&s.transport))
    }

    fn start_watcher(self: &Arc<Self>) {
        let mut watcher = lock(&self.watcher);
        if watcher.is_some() {
            return;
        }

        let mut changes = self.deps.profile.subscribe();
        let weak = Arc::downgrade(self);
        let stop = Arc::new(Notify::new());
        let stopped = Arc::clone(&stop);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = stopped.notified() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    },
                }

                let Some(inner) = weak.upgrade() else { break };
                let (domain, can_create_keys) = {
                    let profile = changes.borrow_and_update();
                    (profile.domain.clone(), profile.step.permits_key_generation())
                };
                match inner.ensure_session(can_create_keys).await {
                    Ok(outcome) => tracing::debug!(?outcome, %domain, "profile changed"),
                    Err(e) if e.is_fatal() => {
                        tracing::error!(
                            %domain,
                            error = %e,
                            "session update after profile change refused"
                        );
                    },
                    Err(e) => {
                        tracing::warn!(
                            %domain,
                            error = %e,
                            "session update after profile change failed"
                        );
                    },
                }
            }
        });

        *watcher = Some(Watcher { stop, task });
    }

    async fn ensure_session(
        self: &Arc<Self>,
        can_create_keys: bool,
    ) -> Result<CreationOutcome, SessionError> {
        let Some(_guard) = CreationGuard::acquire(&self.creating) else {
            tracing::debug!("session creation already in progress");
            return Ok(CreationOutcome::AlreadyInProgress);
        };

        let profile = self.deps.profile.snapshot();
        let mut slot = self.session.lock().await;

        if !profile.permits_connection() {
            if slot.is_some() {
                tracing::info!(step = ?profile.step, "profile no longer permits a connection");
                self.teardown(&mut slot, false).await;
            }
            return Ok(CreationOutcome::NotPermitted);
        }

        let expected = profile.connection_parameters();
        let stale = self.staleness();
        let bound = slot.as_ref().map(|s| s.sub_clients.bound());
        let live = slot
            .as_ref()
            .zip(bound.as_ref())
            .map(|(session, bound)| LiveView { params: &session.params, bound });
        let decision = decision::decide(live, &expected, &profile.components, stale);

        match decision {
            RecreateDecision::Reuse => Ok(CreationOutcome::Reused),
            RecreateDecision::RefreshSubClients(kinds) => {
                tracing::debug!(?kinds, domain = %profile.domain, "rebinding sub-clients");
                self.rebind(&mut slot, &profile.components, can_create_keys).await?;
                Ok(CreationOutcome::Refreshed)
            },
            RecreateDecision::Create => {
                tracing::info!(domain = %profile.domain, "creating session");
                self.build(&mut slot, &profile, can_create_keys).await
            },
            RecreateDecision::Recreate(reason) => {
                tracing::info!(%reason, domain = %profile.domain, "recreating session");
                self.teardown(&mut slot, false).await;
                let outcome = self.build(&mut slot, &profile, can_create_keys).await?;
                Ok(match outcome {
                    CreationOutcome::Created => CreationOutcome::Recreated,
                    other => other,
                })
            },
        }
    }

    async fn build(
        self: &Arc<Self>,
        slot: &mut Option<LiveSession>,
        profile: &Profile,
        can_create_keys: bool,
    ) -> Result<CreationOutcome, SessionError> {
        let params = profile.connection_parameters();
        let domain = params.domain.clone();

        let TransportHandle { client, events } = match self.deps.transports.create(&params) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(%domain, error = %e, "transport construction failed");
                self.lock_status().latest_connection_error = Some(e.to_string());
                return Ok(CreationOutcome::Failed);
            },
        };

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let reset = Arc::new(Notify::new());
        let pump =
            tokio::spawn(pump_events(Arc::downgrade(self), epoch, events, Arc::clone(&reset)));
        let timer = tokio::spawn(reconnect_timer(
            Arc::downgrade(self),
            self.env.clone(),
            self.config.reconnect_interval,
            reset,
        ));

        // Covers the window before the transport's first event arrives.
        self.lock_status().enter(ConnectionState::Connecting, self.env.now());

        *slot = Some(LiveSession {
            params,
            transport: Arc::clone(&client),
            sub_clients: SubClientRegistry::new(),
            tasks: vec![pump.abort_handle(), timer.abort_handle()],
        });

        let report = self.rebind(slot, &profile.components, can_create_keys).await?;
        tracing::debug!(%domain, ?report, "sub-clients bound");

        let domain_override = profile.use_default_connectivity.then_some(domain.as_str());
        if let Err(e) = client.connect(domain_override).await {
            tracing::warn!(%domain, error = %e, "connect failed");
            self.lock_status().latest_connection_error = Some(e.to_string());
        }

        Ok(CreationOutcome::Created)
    }

    /// Bind sub-clients for `components`. A refusal tears the session down.
    async fn rebind(
        self: &Arc<Self>,
        slot: &mut Option<LiveSession>,
        components: &ComponentAddresses,
        can_create_keys: bool,
    ) -> Result<RefreshReport, SessionError> {
        let session = slot.as_mut().ok_or(SessionError::NoTransport)?;
        let domain = session.params.domain.clone();
        let transport = Arc::clone(&session.transport);
        let refreshed = session
            .sub_clients
            .refresh(&transport, components, &*self.deps.sub_clients, can_create_keys)
            .await;

        match refreshed {
            Ok(report) => Ok(report),
            Err(e) => {
                let e = self.map_sub_client_error(e);
                tracing::error!(%domain, error = %e, "sub-client binding refused, session closed");
                self.teardown(slot, false).await;
                Err(e)
            },
        }
    }

    async fn teardown(self: &Arc<Self>, slot: &mut Option<LiveSession>, graceful: bool) {
        let Some(session) = slot.take() else {
            return;
        };

        self.epoch.fetch_add(1, Ordering::AcqRel);
        session.stop_tasks();
        self.background.abort_all();

        let domain = session.params.domain.clone();
        tracing::info!(%domain, graceful, "tearing down session");

        let release = tokio::spawn(Arc::clone(self).release(session, graceful));
        if let Err(e) = release.await {
            tracing::error!(%domain, error = %e, "session release ended abnormally");
        }
    }

    async fn release(self: Arc<Self>, mut session: LiveSession, graceful: bool) {
        let domain = session.params.domain.clone();

        if graceful {
            let presence = session.transport.set_presence(Availability::Offline);
            match with_timeout(&self.env, self.config.offline_presence_timeout, presence).await {
                Some(Ok(())) => {},
                Some(Err(e)) => tracing::debug!(%domain, error = %e, "offline presence failed"),
                None => tracing::debug!(%domain, "offline presence timed out"),
            }
        }

        let failures = session.sub_clients.dispose_all().await;
        if !failures.is_empty() {
            tracing::warn!(%domain, failed = failures.len(), "sub-client disposal incomplete");
        }

        if let Err(e) = session.transport.disconnect().await {
            tracing::warn!(%domain, error = %e, "disconnect failed");
        }

        let changed = {
            let mut status = self.lock_status();
            let changed = status.state != ConnectionState::Offline;
            status.enter(ConnectionState::Offline, self.env.now());
            changed
        };
        if changed {
            tracing::info!(state = %ConnectionState::Offline, "connection state changed");
            self.state_events.emit(&ConnectionState::Offline);
        }
    }

    async fn refresh_sub_clients(self: &Arc<Self>) -> Result<RefreshReport, SessionError> {
        let components = self.deps.profile.components();
        let can_create_keys = self.can_create_keys();

        let mut slot = self.session.lock().await;
        self.rebind(&mut slot, &components, can_create_keys).await
    }

    async fn discover_services(
        self: &Arc<Self>,
        client: Option<Arc<dyn TransportClient>>,
    ) -> Result<bool, SessionError> {
        let transport = match client {
            Some(client) => client,
            None => self.current_transport().await.ok_or(SessionError::NoTransport)?,
        };

        let discovery = ServiceDiscovery::new(self.env.clone(), self.config.discovery_timeout);
        let outcome = discovery.run(transport.as_ref(), &self.deps.profile).await?;

        if !outcome.changed.is_empty() {
            match self.refresh_sub_clients().await {
                Ok(report) => tracing::debug!(?report, "sub-clients refreshed after discovery"),
                Err(SessionError::NoTransport) => {},
                Err(e) => return Err(e),
            }
        }

        Ok(outcome.complete)
    }

    fn on_transport_event(self: &Arc<Self>, epoch: u64, event: TransportEvent, reset: &Notify) {
        if self.epoch.load(Ordering::Acquire) != epoch {
            tracing::trace!(?event, "event from retired transport dropped");
            return;
        }

        match event {
            TransportEvent::StateChanged(state) => self.on_state_changed(state, reset),
            TransportEvent::Error(message) => {
                tracing::warn!(error = %message, "protocol error");
                self.lock_status().latest_error = Some(message);
            },
            TransportEvent::ConnectionError(message) => {
                tracing::warn!(error = %message, "connection error");
                self.lock_status().latest_connection_error = Some(message);
            },
            TransportEvent::Stanza(stanza) => self.route_inbound(stanza),
        }
    }

    fn on_state_changed(self: &Arc<Self>, state: ConnectionState, reset: &Notify) {
        self.lock_status().enter(state, self.env.now());
        tracing::info!(%state, "connection state changed");

        if state.is_connected() {
            reset.notify_one();

            if self.deps.profile.snapshot().wants_discovery() {
                let inner = Arc::clone(self);
                self.background.spawn("post-connect discovery", async move {
                    inner.discover_services(None).await.map(|_| ())
                });
            }
        }

        self.state_events.emit(&state);
    }

    fn route_inbound(&self, stanza: InboundStanza) {
        let Some(sink) = &self.deps.inbound else {
            tracing::trace!(?stanza, "no inbound sink");
            return;
        };

        match sink.try_send(stanza) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(stanza)) => {
                tracing::warn!(?stanza, "inbound sink full, stanza dropped");
            },
            Err(mpsc::error::TrySendError::Closed(stanza)) => {
                tracing::warn!(?stanza, "inbound sink closed, stanza dropped");
            },
        }
    }

    async fn reconnect_tick(&self) {
        let Some(reason) = self.staleness() else {
            return;
        };

        if !self.deps.reachability.is_online() {
            tracing::debug!(%reason, "transport stale but network unreachable");
            return;
        }

        let Some(transport) = self.current_transport().await else {
            return;
        };

        let domain = transport.domain();
        tracing::info!(%reason, %domain, "reconnecting stale transport");
        if let Err(e) = transport.reconnect().await {
            tracing::warn!(%domain, error = %e, "reconnect failed");
            self.lock_status().latest_connection_error = Some(e.to_string());
        }
    }
}

impl<E: Environment> Drop for Inner<E> {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut() {
            session.stop_tasks();
        }
        if let Some(watcher) = lock(&self.watcher).take() {
            watcher.task.abort();
        }
    }
}

async fn pump_events<E: Environment>(
    inner: Weak<Inner<E>>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    reset: Arc<Notify>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        inner.on_transport_event(epoch, event, &reset);
    }
}

async fn reconnect_timer<E: Environment>(
    inner: Weak<Inner<E>>,
    env: E,
    interval: Duration,
    reset: Arc<Notify>,
) {
    loop {
        tokio::select! {
            () = env.sleep(interval) => {},
            () = reset.notified() => {
                tracing::trace!("reconnect timer reset");
                continue;
            },
        }

        let Some(inner) = inner.upgrade() else { break };
        inner.reconnect_tick().await;
    }
}

fn lock<T>(mutex: &SyncMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
