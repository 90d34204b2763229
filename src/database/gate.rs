use std::sync::atomic::{AtomicU8, Ordering};

const OPEN: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// Settles, exactly once, whether a blocking transaction commits or is given up on by the
/// task waiting for it.
#[derive(Debug)]
pub struct CommitGate(AtomicU8);

impl CommitGate {
    pub fn new() -> Self {
        Self(AtomicU8::new(OPEN))
    }

    /// Claims the right to commit. `false` once the waiting task has abandoned the work.
    pub fn begin_commit(&self) -> bool {
        self.settle(COMMITTING)
    }

    /// Gives up on the work. `false` when a commit has already started.
    pub fn abandon(&self) -> bool {
        self.settle(ABANDONED)
    }

    fn settle(&self, outcome: u8) -> bool {
        match self.0.compare_exchange(OPEN, outcome, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => true,
            Err(current) => current == outcome,
        }
    }
}

impl Default for CommitGate {
    fn default() -> Self {
        Self::new()
    }
}
