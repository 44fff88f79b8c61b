//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from the clock. Production uses tokio's clock so
//! tests can run on a paused runtime and drive the reconnect timer without
//! waiting in real time.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production uses `tokio::time::Instant`, which honours a paused test
    /// clock.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Used by the reconnect timer and by every timeout race.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
