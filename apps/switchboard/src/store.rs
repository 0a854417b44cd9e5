use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};

/// Every logical call has a base name `R`; its two rooms are derived from it.
pub fn main_room(base: &str) -> String {
    format!("{base}-main-room")
}

pub fn support_room(base: &str) -> String {
    format!("{base}-support-room")
}

/// An active warm transfer. At most one exists per room base name.
#[derive(Debug, Clone)]
pub struct WarmTransfer {
    pub support_room: String,
    pub agent_identity: Option<String>,
    /// Token minted for the initiating agent at start time. Idempotent
    /// re-starts mint fresh tokens but leave this one untouched.
    pub agent_token: String,
}

/// In-memory map from room base name to its active transfer. State does not
/// survive a process restart.
#[derive(Default)]
pub struct TransferStore {
    inner: Mutex<HashMap<String, WarmTransfer>>,
}

impl TransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room: &str) -> Option<WarmTransfer> {
        self.inner.lock().get(room).cloned()
    }

    pub fn remove(&self, room: &str) -> Option<WarmTransfer> {
        self.inner.lock().remove(room)
    }

    /// Holds the map across a check-then-act sequence. Callers must not
    /// await while the guard is live.
    pub fn guard(&self) -> MutexGuard<'_, HashMap<String, WarmTransfer>> {
        self.inner.lock()
    }
}
