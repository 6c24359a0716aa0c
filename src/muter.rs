use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutes and unmutes forwarded logs.
///
/// Clones share the same flag, so a handle can be given to a controller
/// running on another task while a stream is being forwarded.
#[derive(Debug, Clone, Default)]
pub struct Muter {
    muted: Arc<AtomicBool>,
}

impl Muter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutes the logs.
    pub fn mute(&self) {
        self.muted.store(true, Ordering::SeqCst);
    }

    /// Unmutes the logs.
    pub fn unmute(&self) {
        self.muted.store(false, Ordering::SeqCst);
    }

    /// Flips the current state and returns the new one.
    pub fn toggle(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}
