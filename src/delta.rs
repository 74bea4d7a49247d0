//! Change tracking for one ledger close.
//!
//! Every committed mutation is reported to a [`ChangeRecorder`]. The
//! [`LedgerDelta`] implementation coalesces repeated writes so that each
//! entity appears exactly once, keeping the original before-image and the
//! final after-image. Iteration is in key order so every node reports the
//! same sequence.

use crate::entries::{LedgerEntry, LedgerKey};
use crate::types::LedgerSeq;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryChange {
    Created { after: LedgerEntry },
    Updated { before: LedgerEntry, after: LedgerEntry },
    Deleted { before: LedgerEntry },
}

impl EntryChange {
    /// State at the start of the ledger close, `None` if the entity did not exist.
    pub fn before(&self) -> Option<&LedgerEntry> {
        match self {
            EntryChange::Created { .. } => None,
            EntryChange::Updated { before, .. } | EntryChange::Deleted { before } => Some(before),
        }
    }

    /// State at the end of the ledger close, `None` if the entity is gone.
    pub fn after(&self) -> Option<&LedgerEntry> {
        match self {
            EntryChange::Created { after } | EntryChange::Updated { after, .. } => Some(after),
            EntryChange::Deleted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    #[error("Entry {0:?} added twice in one ledger close")]
    DuplicateAdd(LedgerKey),

    #[error("Entry {0:?} modified after deletion")]
    ModifyDeleted(LedgerKey),

    #[error("Entry {0:?} deleted twice")]
    DoubleDelete(LedgerKey),

    #[error("Before and after images disagree on key: {before:?} vs {after:?}")]
    KeyMismatch { before: LedgerKey, after: LedgerKey },
}

/// Receives before/after images of committed entity mutations.
pub trait ChangeRecorder {
    fn record_add(&mut self, after: LedgerEntry) -> Result<(), DeltaError>;

    fn record_modify(&mut self, before: LedgerEntry, after: LedgerEntry) -> Result<(), DeltaError>;

    fn record_delete(&mut self, before: LedgerEntry) -> Result<(), DeltaError>;
}

#[derive(Debug, Clone)]
pub struct LedgerDelta {
    ledger_seq: LedgerSeq,
    changes: BTreeMap<LedgerKey, EntryChange>,
}

impl LedgerDelta {
    pub fn new(ledger_seq: LedgerSeq) -> Self {
        Self {
            ledger_seq,
            changes: BTreeMap::new(),
        }
    }

    pub fn ledger_seq(&self) -> LedgerSeq {
        self.ledger_seq
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&EntryChange> {
        self.changes.get(key)
    }

    pub fn changes(&self) -> impl Iterator<Item = (&LedgerKey, &EntryChange)> {
        self.changes.iter()
    }

    pub fn count_created(&self) -> usize {
        self.changes
            .values()
            .filter(|c| matches!(c, EntryChange::Created { .. }))
            .count()
    }

    pub fn count_updated(&self) -> usize {
        self.changes
            .values()
            .filter(|c| matches!(c, EntryChange::Updated { .. }))
            .count()
    }

    pub fn count_deleted(&self) -> usize {
        self.changes
            .values()
            .filter(|c| matches!(c, EntryChange::Deleted { .. }))
            .count()
    }

    /// Before-images needed to undo the whole close, in reverse key order.
    pub fn revert_images(&self) -> Vec<(LedgerKey, Option<LedgerEntry>)> {
        self.changes
            .iter()
            .rev()
            .map(|(key, change)| (key.clone(), change.before().cloned()))
            .collect()
    }
}

impl ChangeRecorder for LedgerDelta {
    fn record_add(&mut self, after: LedgerEntry) -> Result<(), DeltaError> {
        let key = after.key();
        match self.changes.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(EntryChange::Created { after });
            }
            Entry::Occupied(mut slot) => {
                // re-creating something deleted earlier in the close is an update
                let before = match slot.get() {
                    EntryChange::Deleted { before } => before.clone(),
                    _ => return Err(DeltaError::DuplicateAdd(key)),
                };
                slot.insert(EntryChange::Updated { before, after });
            }
        }
        Ok(())
    }

    fn record_modify(&mut self, before: LedgerEntry, after: LedgerEntry) -> Result<(), DeltaError> {
        let key = after.key();
        let before_key = before.key();
        if key != before_key {
            return Err(DeltaError::KeyMismatch {
                before: before_key,
                after: key,
            });
        }
        match self.changes.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(EntryChange::Updated { before, after });
            }
            Entry::Occupied(mut slot) => {
                let next = match slot.get() {
                    EntryChange::Created { .. } => EntryChange::Created { after },
                    EntryChange::Updated { before: original, .. } => EntryChange::Updated {
                        before: original.clone(),
                        after,
                    },
                    EntryChange::Deleted { .. } => return Err(DeltaError::ModifyDeleted(key)),
                };
                slot.insert(next);
            }
        }
        Ok(())
    }

    fn record_delete(&mut self, before: LedgerEntry) -> Result<(), DeltaError> {
        let key = before.key();
        match self.changes.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(EntryChange::Deleted { before });
            }
            Entry::Occupied(slot) => match slot.get() {
                // created and deleted within the close: never existed outside it
                EntryChange::Created { .. } => {
                    slot.remove();
                }
                EntryChange::Updated { before: original, .. } => {
                    let original = original.clone();
                    *slot.into_mut() = EntryChange::Deleted { before: original };
                }
                EntryChange::Deleted { .. } => return Err(DeltaError::DoubleDelete(key)),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::OfferRecord;
    use crate::offer::{Offer, OfferFlags};
    use crate::price::Price;
    use crate::types::{AccountId, Asset, OfferId};

    fn record(id: u64, amount: i64) -> LedgerEntry {
        let offer = Offer::new(
            AccountId::from_u64(1),
            OfferId(id),
            Asset::Native,
            Asset::credit("USD", AccountId::from_u64(2)).unwrap(),
            amount,
            Price::new(1, 1).unwrap(),
            OfferFlags::NONE,
        );
        LedgerEntry::Offer(OfferRecord::new(offer, LedgerSeq(5)))
    }

    #[test]
    fn add_then_modify_stays_created() {
        let mut delta = LedgerDelta::new(LedgerSeq(5));
        delta.record_add(record(1, 10)).unwrap();
        delta.record_modify(record(1, 10), record(1, 7)).unwrap();

        assert_eq!(delta.len(), 1);
        assert_eq!(delta.count_created(), 1);
        let change = delta.get(&record(1, 0).key()).unwrap();
        assert_eq!(change.after(), Some(&record(1, 7)));
    }

    #[test]
    fn add_then_delete_vanishes() {
        let mut delta = LedgerDelta::new(LedgerSeq(5));
        delta.record_add(record(1, 10)).unwrap();
        delta.record_delete(record(1, 10)).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn modify_twice_keeps_original_before() {
        let mut delta = LedgerDelta::new(LedgerSeq(5));
        delta.record_modify(record(1, 10), record(1, 8)).unwrap();
        delta.record_modify(record(1, 8), record(1, 3)).unwrap();
        delta.record_delete(record(1, 3)).unwrap();

        let change = delta.get(&record(1, 0).key()).unwrap();
        assert_eq!(change.before(), Some(&record(1, 10)));
        assert!(change.after().is_none());
        assert_eq!(delta.count_deleted(), 1);
    }

    #[test]
    fn delete_then_add_is_update() {
        let mut delta = LedgerDelta::new(LedgerSeq(5));
        delta.record_delete(record(1, 10)).unwrap();
        delta.record_add(record(1, 4)).unwrap();
        assert_eq!(delta.count_updated(), 1);
    }

    #[test]
    fn misuse_is_reported() {
        let mut delta = LedgerDelta::new(LedgerSeq(5));
        delta.record_add(record(1, 10)).unwrap();
        assert!(matches!(delta.record_add(record(1, 10)), Err(DeltaError::DuplicateAdd(_))));

        delta.record_delete(record(2, 1)).unwrap();
        assert!(matches!(delta.record_delete(record(2, 1)), Err(DeltaError::DoubleDelete(_))));
        assert!(matches!(
            delta.record_modify(record(2, 1), record(2, 2)),
            Err(DeltaError::ModifyDeleted(_))
        ));
        assert!(matches!(
            delta.record_modify(record(3, 1), record(4, 1)),
            Err(DeltaError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn revert_images_reverse_key_order() {
        let mut delta = LedgerDelta::new(LedgerSeq(5));
        delta.record_add(record(1, 10)).unwrap();
        delta.record_modify(record(2, 5), record(2, 6)).unwrap();

        let images = delta.revert_images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].1, Some(record(2, 5)));
        assert_eq!(images[1].1, None);
    }
}
