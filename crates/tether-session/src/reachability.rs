//! Network reachability collaborator.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the device currently has network connectivity.
///
/// Read once per reconnect tick. Push notifications about connectivity are
/// handled elsewhere.
pub trait NetworkReachability: Send + Sync {
    /// Device is online.
    fn is_online(&self) -> bool;
}

/// Reachability flag set by the platform layer.
#[derive(Debug)]
pub struct ReachabilityFlag {
    online: AtomicBool,
}

impl ReachabilityFlag {
    /// Flag with an initial value.
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    /// Update the flag.
    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for ReachabilityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkReachability for ReachabilityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}
