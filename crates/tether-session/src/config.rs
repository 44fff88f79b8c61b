//! Session manager configuration.

use std::time::Duration;

use tether_core::decision::DEFAULT_STALE_AFTER;

/// Interval between reconnect checks.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Time `load` waits for the session to reach `Connected`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a graceful unload waits for the offline presence to go out.
pub const DEFAULT_OFFLINE_PRESENCE_TIMEOUT: Duration = Duration::from_secs(1);

/// Time one disco request may take before its component is skipped.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reconnect timer period
    pub reconnect_interval: Duration,
    /// Time outside `Connected` after which the transport is stale
    pub stale_after: Duration,
    /// Upper bound for `load` to wait for `Connected`
    pub connect_timeout: Duration,
    /// `load` waits for `Connected` before returning
    pub wait_on_load: bool,
    /// Upper bound for the offline presence on graceful unload
    pub offline_presence_timeout: Duration,
    /// Upper bound for each disco request
    pub discovery_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            wait_on_load: true,
            offline_presence_timeout: DEFAULT_OFFLINE_PRESENCE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}
