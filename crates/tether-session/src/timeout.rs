//! Timeout races against the environment clock.

use std::{future::Future, time::Duration};

use tether_core::env::Environment;

/// Run `fut` until it completes or `limit` elapses. `None` on timeout.
pub(crate) async fn with_timeout<E, F>(env: &E, limit: Duration, fut: F) -> Option<F::Output>
where
    E: Environment,
    F: Future,
{
    tokio::select! {
        biased;
        out = fut => Some(out),
        () = env.sleep(limit) => None,
    }
}
