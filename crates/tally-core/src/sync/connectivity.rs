use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Synchronous "is the network reachable" probe.
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// Shared, settable connectivity indicator.
///
/// Clones observe the same flag, so whoever owns the network monitor can
/// flip it while the coordinator holds another handle.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag(Arc<AtomicBool>);

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Connectivity for bool {
    fn is_online(&self) -> bool {
        *self
    }
}
