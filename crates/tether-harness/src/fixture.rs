//! Ready-made session under simulation.

use std::sync::Arc;

use tether_client::{InboundStanza, SubClientFactory, TransportFactory};
use tether_core::{ConnectionParameters, RegistrationStep};
use tether_session::{
    NetworkReachability, Profile, ProfileStore, ReachabilityFlag, SessionConfig, SessionDeps,
    SessionManager, TokioEnv,
};
use tokio::sync::mpsc;

use crate::{
    recording::RecordingSubClientFactory, sim_server::SimServer, sim_transport::SimTransportFactory,
};

/// Domain used by the fixtures.
pub const DOMAIN: &str = "example.org";

/// Profile that finished onboarding on [`DOMAIN`].
pub fn onboarded_profile() -> Profile {
    Profile {
        domain: DOMAIN.into(),
        account: "alice".into(),
        password_hash: "c2NyYW0taGFzaA==".into(),
        password_hash_method: "SCRAM-SHA-256".into(),
        step: RegistrationStep::Complete,
        ..Profile::default()
    }
}

/// Connection parameters of [`onboarded_profile`].
pub fn onboarded_params() -> ConnectionParameters {
    onboarded_profile().connection_parameters()
}

/// Options for [`SessionFixture::build`].
pub struct FixtureOptions {
    /// Initial profile.
    pub profile: Profile,
    /// Session configuration.
    pub config: SessionConfig,
    /// Server directory.
    pub server: Arc<SimServer>,
    /// Sub-client factory; the fixture's recording factory when `None`.
    pub sub_clients: Option<Arc<dyn SubClientFactory>>,
    /// Inbound stanza sink.
    pub inbound: Option<mpsc::Sender<InboundStanza>>,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            profile: onboarded_profile(),
            config: SessionConfig::default(),
            server: Arc::new(SimServer::with_standard_components(DOMAIN)),
            sub_clients: None,
            inbound: None,
        }
    }
}

/// A session manager wired to simulated collaborators.
pub struct SessionFixture {
    /// Manager under test.
    pub manager: SessionManager<TokioEnv>,
    /// Profile store the manager follows.
    pub profile: Arc<ProfileStore>,
    /// Transport factory.
    pub transports: Arc<SimTransportFactory>,
    /// Recording sub-client factory (unused when options supplied another).
    pub sub_clients: Arc<RecordingSubClientFactory>,
    /// Reachability flag, initially online.
    pub reachability: Arc<ReachabilityFlag>,
    /// Server directory.
    pub server: Arc<SimServer>,
}

impl SessionFixture {
    /// Fixture with default options.
    pub fn new() -> Self {
        Self::build(FixtureOptions::default())
    }

    /// Fixture with `options`.
    pub fn build(options: FixtureOptions) -> Self {
        let profile = Arc::new(ProfileStore::new(options.profile));
        let transports = Arc::new(SimTransportFactory::new(Arc::clone(&options.server)));
        let sub_clients = Arc::new(RecordingSubClientFactory::new());
        let reachability = Arc::new(ReachabilityFlag::new(true));

        let factory: Arc<dyn SubClientFactory> = match options.sub_clients {
            Some(factory) => factory,
            None => Arc::clone(&sub_clients) as Arc<dyn SubClientFactory>,
        };

        let deps = SessionDeps {
            profile: Arc::clone(&profile),
            transports: Arc::clone(&transports) as Arc<dyn TransportFactory>,
            sub_clients: factory,
            reachability: Arc::clone(&reachability) as Arc<dyn NetworkReachability>,
            inbound: options.inbound,
        };
        let manager = SessionManager::new(TokioEnv::new(), options.config, deps);

        Self { manager, profile, transports, sub_clients, reachability, server: options.server }
    }
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self::new()
    }
}
