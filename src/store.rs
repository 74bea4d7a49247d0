//! Offer store.
//!
//! Create/update/delete of offer entities through an [`OfferTable`], with
//! every committed write reported to a [`ChangeRecorder`] first. A write
//! that the recorder rejects never reaches the table.

use crate::delta::{ChangeRecorder, DeltaError};
use crate::entries::{LedgerEntry, OfferRecord};
use crate::offer::{Offer, OfferError, OfferKey};
use crate::selector;
use crate::table::{MemoryOfferTable, OfferTable};
use crate::types::{AccountId, Asset, LedgerRange, LedgerSeq, OfferId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    EntityNotFound(OfferKey),

    #[error("{0} already exists")]
    EntityAlreadyExists(OfferKey),

    #[error("Malformed offer: {0}")]
    Malformed(#[from] OfferError),

    #[error("Offer id must be assigned before storing")]
    UnassignedId,

    #[error("Full offer scans are disabled")]
    FullScanDisabled,

    #[error("Change delta rejected write: {0}")]
    Delta(#[from] DeltaError),
}

#[derive(Debug, Clone)]
pub struct OfferStore<T: OfferTable = MemoryOfferTable> {
    table: T,
    allow_full_scan: bool,
}

impl Default for OfferStore<MemoryOfferTable> {
    fn default() -> Self {
        Self::new(MemoryOfferTable::new())
    }
}

impl<T: OfferTable> OfferStore<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            allow_full_scan: false,
        }
    }

    /// Opt in to O(total offers) scans. Off by default.
    pub fn with_full_scan(mut self, allow: bool) -> Self {
        self.allow_full_scan = allow;
        self
    }

    pub fn set_full_scan(&mut self, allow: bool) {
        self.allow_full_scan = allow;
    }

    pub fn full_scan_allowed(&self) -> bool {
        self.allow_full_scan
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn add(
        &mut self,
        offer: Offer,
        ledger_seq: LedgerSeq,
        delta: &mut dyn ChangeRecorder,
    ) -> Result<OfferRecord, StoreError> {
        offer.validate()?;
        if offer.offer_id.is_unassigned() {
            return Err(StoreError::UnassignedId);
        }
        // offer ids are unique across the ledger, not per seller
        let key = offer.key();
        if self.table.get_by_id(offer.offer_id).is_some() {
            return Err(StoreError::EntityAlreadyExists(key));
        }

        let record = OfferRecord::new(offer, ledger_seq);
        delta.record_add(LedgerEntry::Offer(record.clone()))?;
        self.table.upsert(record.clone());
        Ok(record)
    }

    /// Replaces a stored offer. Returns the previous record.
    pub fn update(
        &mut self,
        offer: Offer,
        ledger_seq: LedgerSeq,
        delta: &mut dyn ChangeRecorder,
    ) -> Result<OfferRecord, StoreError> {
        offer.validate()?;
        let key = offer.key();
        let before = self
            .table
            .get(&key)
            .cloned()
            .ok_or(StoreError::EntityNotFound(key))?;

        let after = OfferRecord::new(offer, ledger_seq);
        delta.record_modify(LedgerEntry::Offer(before.clone()), LedgerEntry::Offer(after.clone()))?;
        self.table.upsert(after);
        Ok(before)
    }

    /// Removes a stored offer. Returns the removed record.
    pub fn delete(
        &mut self,
        seller_id: &AccountId,
        offer_id: OfferId,
        delta: &mut dyn ChangeRecorder,
    ) -> Result<OfferRecord, StoreError> {
        let key = OfferKey::new(*seller_id, offer_id);
        let before = self
            .table
            .get(&key)
            .cloned()
            .ok_or(StoreError::EntityNotFound(key))?;

        delta.record_delete(LedgerEntry::Offer(before.clone()))?;
        self.table.remove(&key);
        Ok(before)
    }

    pub fn exists(&self, key: &OfferKey) -> bool {
        self.table.get(key).is_some()
    }

    /// Whether any seller holds `offer_id`.
    pub fn id_taken(&self, offer_id: OfferId) -> bool {
        self.table.get_by_id(offer_id).is_some()
    }

    pub fn load_by_id(&self, seller_id: &AccountId, offer_id: OfferId) -> Option<Offer> {
        self.load_record(&OfferKey::new(*seller_id, offer_id))
            .map(|rec| rec.offer.clone())
    }

    pub fn load_record(&self, key: &OfferKey) -> Option<&OfferRecord> {
        self.table.get(key)
    }

    /// Offers of `account_id` that sell or buy `asset`. Reconciliation only.
    pub fn load_all_for_account_and_asset(&self, account_id: &AccountId, asset: &Asset) -> Vec<Offer> {
        self.table
            .select_seller(account_id)
            .into_iter()
            .filter(|rec| rec.offer.selling == *asset || rec.offer.buying == *asset)
            .map(|rec| rec.offer.clone())
            .collect()
    }

    /// Every offer grouped by seller. O(total offers); gated by `allow_full_scan`.
    pub fn load_all_offers(&self) -> Result<BTreeMap<AccountId, Vec<Offer>>, StoreError> {
        if !self.allow_full_scan {
            warn!("Refused full offer scan");
            return Err(StoreError::FullScanDisabled);
        }
        let mut by_seller: BTreeMap<AccountId, Vec<Offer>> = BTreeMap::new();
        for rec in self.table.scan() {
            by_seller
                .entry(rec.offer.seller_id)
                .or_default()
                .push(rec.offer.clone());
        }
        Ok(by_seller)
    }

    /// Number of stored offers, optionally only those last modified within `range`.
    pub fn count_objects(&self, range: Option<LedgerRange>) -> u64 {
        match range {
            None => self.table.len() as u64,
            Some(range) => self
                .table
                .scan()
                .filter(|rec| range.contains(rec.last_modified))
                .count() as u64,
        }
    }

    pub fn best_offers(&self, max_count: usize, offset: usize, selling: &Asset, buying: &Asset) -> Vec<Offer> {
        selector::best_offers(&self.table, max_count, offset, selling, buying)
    }

    pub fn drop_all(&mut self) {
        let dropped = self.table.len();
        self.table.clear();
        info!(dropped, "Dropped all offers");
    }

    /// Rollback helper: removes every offer last modified at or after `ledger_seq`.
    /// Bypasses the change delta.
    pub fn delete_all_modified_since_ledger(&mut self, ledger_seq: LedgerSeq) -> usize {
        let removed = self
            .table
            .retain(&mut |rec: &OfferRecord| rec.last_modified < ledger_seq);
        info!(ledger_seq = %ledger_seq, removed, "Deleted offers modified since ledger");
        removed
    }

    /// Puts back a before-image captured by a change delta.
    pub(crate) fn restore(&mut self, key: &OfferKey, image: Option<OfferRecord>) {
        match image {
            Some(record) => {
                self.table.upsert(record);
            }
            None => {
                self.table.remove(key);
            }
        }
        debug!(offer = %key, "Restored offer image");
    }
}
