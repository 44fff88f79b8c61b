//! Production environment backed by tokio's clock.
//!
//! `TokioEnv` reads `tokio::time::Instant` rather than the std clock, so a
//! test runtime started with a paused clock controls every timer the session
//! manager uses.

use std::time::Duration;

use tether_core::env::Environment;

/// Environment using tokio time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioEnv;

impl TokioEnv {
    /// Create a new tokio environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for TokioEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = TokioEnv::new();

        let start = env.now();
        env.sleep(Duration::from_secs(30)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_secs(30), "sleep should wait at least 30s");
    }
}
