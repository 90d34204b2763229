use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Lifecycle of the storage backend.
///
/// ```text
/// Uninitialized -> Initializing -> Available
///                              \-> Degraded -> Initializing -> ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StorageMode {
    Uninitialized = 0,
    Initializing = 1,
    Available = 2,
    Degraded = 3,
}

impl StorageMode {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Available,
            _ => Self::Degraded,
        }
    }
}

/// Availability flag shared by every handle to the same storage.
///
/// Readers only touch the atomic; initialization attempts are serialized through
/// `attempts`, which also remembers when the last attempt finished.
#[derive(Debug)]
pub struct StorageState {
    mode: AtomicU8,
    attempts: Mutex<Option<Instant>>,
}

impl StorageState {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(StorageMode::Uninitialized as u8),
            attempts: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> StorageMode {
        StorageMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn is_available(&self) -> bool {
        self.mode() == StorageMode::Available
    }

    pub(super) fn set(&self, mode: StorageMode) {
        let previous = StorageMode::from_u8(self.mode.swap(mode as u8, Ordering::AcqRel));
        if previous != mode {
            tracing::debug!(?previous, current = ?mode, "storage mode changed");
        }
    }

    /// Waits for exclusive right to run an initialization attempt.
    pub(super) async fn lock_attempts(&self) -> MutexGuard<'_, Option<Instant>> {
        self.attempts.lock().await
    }

    /// Takes the right to run an initialization attempt, unless another one is running.
    pub(super) fn try_lock_attempts(&self) -> Option<MutexGuard<'_, Option<Instant>>> {
        self.attempts.try_lock().ok()
    }
}

impl Default for StorageState {
    fn default() -> Self {
        Self::new()
    }
}
