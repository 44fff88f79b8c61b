//! Service discovery.
//!
//! Asks the server for its child components, then asks every component for
//! its feature set. The feature queries run concurrently, one per item. All
//! answers are merged into the profile in a single update, so concurrent
//! readers never observe half a discovery run and no two writers race.

use std::time::Duration;

use futures::future::join_all;
use tether_client::TransportClient;
use tether_core::{DiscoInfo, DiscoveryOutcome, discovery, env::Environment};

use crate::{error::SessionError, profile::ProfileStore, timeout::with_timeout};

/// Runs discovery against a transport and records the results.
pub struct ServiceDiscovery<E: Environment> {
    env: E,
    request_timeout: Duration,
}

impl<E: Environment> ServiceDiscovery<E> {
    /// Discovery with a per-request timeout.
    pub fn new(env: E, request_timeout: Duration) -> Self {
        Self { env, request_timeout }
    }

    /// Discover components of the transport's domain and merge them into
    /// `profile`.
    ///
    /// A component whose info query fails or times out is skipped; the rest
    /// are still recorded. Known addresses are never erased.
    ///
    /// # Errors
    ///
    /// - `SessionError::Discovery` if the item list itself cannot be fetched
    pub async fn run(
        &self,
        transport: &dyn TransportClient,
        profile: &ProfileStore,
    ) -> Result<DiscoveryOutcome, SessionError> {
        let domain = transport.domain();

        let query = transport.discover_items(&domain);
        let items = match with_timeout(&self.env, self.request_timeout, query).await {
            Some(Ok(items)) => items,
            Some(Err(e)) => return Err(SessionError::Discovery(e.to_string())),
            None => {
                return Err(SessionError::Discovery(format!(
                    "item query timed out after {:?}",
                    self.request_timeout
                )));
            },
        };

        let queries = items.iter().map(|jid| async move {
            let info =
                with_timeout(&self.env, self.request_timeout, transport.discover_info(jid)).await;
            (jid.as_str(), info)
        });

        let mut answered: Vec<(&str, DiscoInfo)> = Vec::with_capacity(items.len());
        for (jid, info) in join_all(queries).await {
            match info {
                Some(Ok(info)) => answered.push((jid, info)),
                Some(Err(e)) => tracing::warn!(%domain, jid, error = %e, "component info failed"),
                None => tracing::warn!(%domain, jid, "component info timed out"),
            }
        }

        let found = discovery::resolve(answered.iter().map(|(jid, info)| (*jid, info)));
        let outcome = profile.merge_components(&found);

        tracing::info!(
            %domain,
            items = items.len(),
            complete = outcome.complete,
            changed = ?outcome.changed,
            missing = ?outcome.missing,
            "service discovery finished"
        );

        Ok(outcome)
    }
}
