// 4.0: offer id assignment. ids are monotonic across the whole ledger and never reused,
// even after the offer is deleted. an aborted ledger close hands its ids back.

use crate::types::OfferId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdPool {
    last_generated: u64,
}

/// Pool state captured at the start of a ledger close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCheckpoint(u64);

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume after `last_generated` (e.g. the highest id already on the ledger).
    pub fn starting_after(last_generated: u64) -> Self {
        Self { last_generated }
    }

    /// Returns `None` once the id space is exhausted.
    pub fn next_id(&mut self) -> Option<OfferId> {
        let next = self.last_generated.checked_add(1)?;
        self.last_generated = next;
        Some(OfferId(next))
    }

    pub fn last_generated(&self) -> u64 {
        self.last_generated
    }

    /// Keeps the pool ahead of an externally chosen id.
    pub fn observe(&mut self, id: OfferId) {
        self.last_generated = self.last_generated.max(id.0);
    }

    pub fn checkpoint(&self) -> IdCheckpoint {
        IdCheckpoint(self.last_generated)
    }

    pub fn restore(&mut self, checkpoint: IdCheckpoint) {
        self.last_generated = checkpoint.0;
    }
}
