//! Tether session runner.
//!
//! Drives a session manager against the in-process simulated server, logging
//! every state transition, until interrupted or the run duration elapses.
//!
//! # Usage
//!
//! ```bash
//! # Run until Ctrl-C
//! tether --domain example.org --account alice
//!
//! # Check the domain first, then run for 30 seconds with debug logs
//! tether --probe --duration 30 --log-level debug
//!
//! # Watch the reconnect timer retry an unreachable server
//! tether --unreachable "connection refused" --reconnect-interval 2
//! ```

use std::{sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use tether_client::{
    InboundStanza, KeyRing, StandardSubClientFactory, SubClientFactory, TransportFactory,
};
use tether_core::RegistrationStep;
use tether_harness::{ConnectBehavior, SimServer, SimTransportFactory};
use tether_session::{
    ConnectProbe, NetworkReachability, Profile, ProfileStore, ReachabilityFlag, SessionConfig,
    SessionDeps, SessionManager, TokioEnv,
};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Onboarding step to start from
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Step {
    /// Contact details not yet verified
    ValidateContactInfo,
    /// Account being created
    CreateAccount,
    /// Legal identity being registered
    RegisterIdentity,
    /// Waiting for identity approval
    ValidateIdentity,
    /// PIN being defined
    DefinePin,
    /// Onboarding finished
    Complete,
}

impl From<Step> for RegistrationStep {
    fn from(step: Step) -> Self {
        match step {
            Step::ValidateContactInfo => Self::ValidateContactInfo,
            Step::CreateAccount => Self::CreateAccount,
            Step::RegisterIdentity => Self::RegisterIdentity,
            Step::ValidateIdentity => Self::ValidateIdentity,
            Step::DefinePin => Self::DefinePin,
            Step::Complete => Self::Complete,
        }
    }
}

/// Tether session runner
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Keep an XMPP session alive against a simulated server")]
#[command(version)]
struct Args {
    /// Server domain
    #[arg(short, long, default_value = "example.org")]
    domain: String,

    /// Account name
    #[arg(short, long, default_value = "alice")]
    account: String,

    /// Password hash
    #[arg(long, default_value = "c2NyYW0taGFzaA==")]
    password_hash: String,

    /// Password hash method
    #[arg(long, default_value = "SCRAM-SHA-256")]
    password_hash_method: String,

    /// Onboarding step recorded in the profile
    #[arg(long, value_enum, default_value = "complete")]
    step: Step,

    /// Seconds between reconnect checks
    #[arg(long, default_value = "10")]
    reconnect_interval: u64,

    /// Make every handshake fail with this connection error
    #[arg(long)]
    unreachable: Option<String>,

    /// Probe the domain before loading the session
    #[arg(long)]
    probe: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(domain = %args.domain, account = %args.account, "tether starting");

    let server = Arc::new(SimServer::with_standard_components(args.domain.clone()));
    let transports = Arc::new(SimTransportFactory::new(server));
    if let Some(reason) = &args.unreachable {
        tracing::warn!(%reason, "simulating an unreachable server");
        transports.set_behavior(ConnectBehavior::Unreachable(reason.clone()));
    }

    let profile = Arc::new(ProfileStore::new(Profile {
        domain: args.domain.clone(),
        account: args.account.clone(),
        password_hash: args.password_hash.clone(),
        password_hash_method: args.password_hash_method.clone(),
        step: args.step.into(),
        ..Profile::default()
    }));

    let (inbound, mut stanzas) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(stanza) = stanzas.recv().await {
            log_stanza(&stanza);
        }
    });

    let deps = SessionDeps {
        profile: Arc::clone(&profile),
        transports: Arc::clone(&transports) as Arc<dyn TransportFactory>,
        sub_clients: Arc::new(StandardSubClientFactory::new(Arc::new(KeyRing::provisioned())))
            as Arc<dyn SubClientFactory>,
        reachability: Arc::new(ReachabilityFlag::new(true)) as Arc<dyn NetworkReachability>,
        inbound: Some(inbound),
    };
    let config = SessionConfig {
        reconnect_interval: Duration::from_secs(args.reconnect_interval),
        ..SessionConfig::default()
    };
    let manager = SessionManager::new(TokioEnv::new(), config, deps);

    manager.on_state_changed(|state| {
        tracing::info!(%state, "session state");
        Ok(())
    });

    if args.probe {
        let params = profile.connection_parameters();
        let outcome = manager
            .try_connect(&params, ConnectProbe::ReachServer, Duration::from_secs(10), false)
            .await;
        if outcome.succeeded {
            tracing::info!(domain = %params.domain, "domain probe succeeded");
        } else {
            let reason = outcome.reason.unwrap_or_default();
            tracing::warn!(domain = %params.domain, %reason, "domain probe failed");
        }
    }

    let connected = manager.load().await?;
    tracing::info!(connected, jid = ?manager.bare_jid(), "session loaded");
    if let Some(banner) = manager.error_banner() {
        tracing::warn!(%banner, "session reported an error");
    }

    match args.duration {
        Some(secs) => {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "run duration elapsed");
                },
                signal = tokio::signal::ctrl_c() => signal?,
            }
        },
        None => tokio::signal::ctrl_c().await?,
    }

    tracing::info!("shutting down");
    manager.unload(false).await;

    for failure in manager.task_failures() {
        tracing::warn!(task = failure.task, reason = %failure.reason, "background task failed");
    }

    Ok(())
}

fn log_stanza(stanza: &InboundStanza) {
    match stanza {
        InboundStanza::PresenceSubscribe { from } => {
            tracing::info!(%from, "presence subscription request");
        },
        InboundStanza::ChatMessage { from, body } => {
            tracing::info!(%from, len = body.len(), "chat message");
        },
        InboundStanza::Other { name } => tracing::debug!(%name, "unhandled stanza"),
    }
}
