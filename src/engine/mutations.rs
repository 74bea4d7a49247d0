//! Offer mutations.
//!
//! Each call walks `Proposed -> LiabilityCheck -> Accepted | Rejected`. The
//! liability change and the entity write land together or not at all.

use super::core::{OfferBook, OpenLedger};
use super::results::{EngineError, MutationOutcome, MutationStage};
use crate::balances::{BalanceProvider, BalanceStore};
use crate::delta::ChangeRecorder;
use crate::entries::{LedgerEntry, LedgerKey};
use crate::events::{
    DeleteReason, EventPayload, MutationRejectedEvent, OfferCreatedEvent, OfferDeletedEvent,
    OfferUpdatedEvent,
};
use crate::id_pool::IdPool;
use crate::liabilities::{LiabilityError, LiabilityLedger, LineChange};
use crate::offer::{Offer, OfferFlags, OfferKey};
use crate::price::Price;
use crate::store::{OfferStore, StoreError};
use crate::types::{AccountId, Asset, OfferId};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Request to place a new offer. `offer_id` 0 asks the pool for the next id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub flags: OfferFlags,
}

impl NewOffer {
    pub fn new(seller_id: AccountId, selling: Asset, buying: Asset, amount: i64, price: Price) -> Self {
        Self {
            seller_id,
            offer_id: OfferId::UNASSIGNED,
            selling,
            buying,
            amount,
            price,
            flags: OfferFlags::NONE,
        }
    }

    pub fn passive(mut self) -> Self {
        self.flags = OfferFlags::PASSIVE;
        self
    }

    pub fn with_id(mut self, offer_id: OfferId) -> Self {
        self.offer_id = offer_id;
        self
    }
}

/// Request to change an existing offer. The asset pair is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferUpdate {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    /// 0 deletes the offer.
    pub amount: i64,
    pub price: Price,
    pub flags: OfferFlags,
}

enum EntityWrite {
    Add,
    Update,
    Delete,
}

type LineSnapshots = BTreeMap<LedgerKey, LedgerEntry>;

impl OfferBook {
    pub fn create_offer(&mut self, request: NewOffer) -> Result<MutationOutcome, EngineError> {
        self.ensure_writable()?;

        let offer = Offer::new(
            request.seller_id,
            request.offer_id,
            request.selling,
            request.buying,
            request.amount,
            request.price,
            request.flags,
        );
        let key = offer.key();

        if let Err(e) = self.propose_create(&offer) {
            return Err(self.reject(key, MutationStage::Proposed, e));
        }

        let outcome = self.run(key, None, Some(offer), EntityWrite::Add)?;
        if let Some(created) = &outcome.after {
            self.emit_event(EventPayload::OfferCreated(OfferCreatedEvent {
                seller_id: created.seller_id,
                offer_id: created.offer_id,
                selling: created.selling.clone(),
                buying: created.buying.clone(),
                amount: created.amount,
                price: created.price,
                passive: created.is_passive(),
            }));
        }
        Ok(outcome)
    }

    /// Changes amount, price or flags. An amount of 0 deletes the offer.
    pub fn update_offer(&mut self, request: OfferUpdate) -> Result<MutationOutcome, EngineError> {
        self.ensure_writable()?;

        let key = OfferKey::new(request.seller_id, request.offer_id);
        let Some(before) = self.store.load_by_id(&request.seller_id, request.offer_id) else {
            return Err(self.reject(key, MutationStage::Proposed, StoreError::EntityNotFound(key).into()));
        };

        if request.amount == 0 {
            return self.remove(before, DeleteReason::ZeroAmount);
        }

        let after = Offer {
            amount: request.amount,
            price: request.price,
            flags: request.flags,
            ..before.clone()
        };
        if let Err(e) = after.validate() {
            return Err(self.reject(key, MutationStage::Proposed, e.into()));
        }

        let outcome = self.run(key, Some(before.clone()), Some(after.clone()), EntityWrite::Update)?;
        self.emit_event(EventPayload::OfferUpdated(OfferUpdatedEvent {
            seller_id: key.seller_id,
            offer_id: key.offer_id,
            old_amount: before.amount,
            new_amount: after.amount,
            old_price: before.price,
            new_price: after.price,
        }));
        Ok(outcome)
    }

    /// Cancels an offer and releases everything it reserved.
    pub fn delete_offer(&mut self, seller_id: &AccountId, offer_id: OfferId) -> Result<MutationOutcome, EngineError> {
        self.ensure_writable()?;

        let key = OfferKey::new(*seller_id, offer_id);
        let Some(before) = self.store.load_by_id(seller_id, offer_id) else {
            return Err(self.reject(key, MutationStage::Proposed, StoreError::EntityNotFound(key).into()));
        };
        self.remove(before, DeleteReason::Cancelled)
    }

    fn remove(&mut self, before: Offer, reason: DeleteReason) -> Result<MutationOutcome, EngineError> {
        let key = before.key();
        let remaining_amount = before.amount;
        let outcome = self.run(key, Some(before), None, EntityWrite::Delete)?;
        self.emit_event(EventPayload::OfferDeleted(OfferDeletedEvent {
            seller_id: key.seller_id,
            offer_id: key.offer_id,
            remaining_amount,
            reason,
        }));
        Ok(outcome)
    }

    fn ensure_writable(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        if self.open.is_none() {
            return Err(EngineError::NoOpenLedger);
        }
        Ok(())
    }

    fn propose_create(&self, offer: &Offer) -> Result<(), EngineError> {
        offer.validate()?;
        if offer.amount == 0 {
            return Err(EngineError::EmptyOffer);
        }
        if self.balances.account(&offer.seller_id).is_none() {
            return Err(EngineError::AccountNotFound(offer.seller_id));
        }
        if !offer.offer_id.is_unassigned() && self.store.id_taken(offer.offer_id) {
            return Err(StoreError::EntityAlreadyExists(offer.key()).into());
        }
        Ok(())
    }

    /// Liability check, then entity write. Any failure after the check puts
    /// the touched balance records back exactly as they were.
    fn run(
        &mut self,
        key: OfferKey,
        before: Option<Offer>,
        after: Option<Offer>,
        write: EntityWrite,
    ) -> Result<MutationOutcome, EngineError> {
        let receivable = match after.as_ref().map(Offer::receivable_amount).transpose() {
            Ok(amount) => amount.unwrap_or(0),
            Err(e) => return Err(self.reject(key, MutationStage::LiabilityCheck, e.into())),
        };
        let snapshots = self.snapshot_lines(before.iter().chain(after.iter()));

        let line_changes = match LiabilityLedger::new(&mut self.balances)
            .apply_offer_change(before.as_ref(), after.as_ref())
        {
            Ok(changes) => changes,
            Err(e) => return Err(self.reject(key, MutationStage::LiabilityCheck, e.into())),
        };

        let ids = self.id_pool.checkpoint();
        let persisted = match self.open.as_mut() {
            Some(open) => persist(
                &mut self.store,
                &mut self.balances,
                &mut self.id_pool,
                open,
                &snapshots,
                &line_changes,
                after.clone(),
                &key,
                write,
            ),
            None => Err(EngineError::NoOpenLedger),
        };

        match persisted {
            Ok(final_after) => {
                let key = final_after.as_ref().map(|o| o.key()).unwrap_or(key);
                debug!(
                    offer = %key,
                    lines = line_changes.len(),
                    deleted = final_after.is_none(),
                    "Offer mutation accepted"
                );
                Ok(MutationOutcome {
                    key,
                    stage: MutationStage::Accepted,
                    before,
                    after: final_after,
                    line_changes,
                    receivable,
                })
            }
            Err(e) => {
                self.id_pool.restore(ids);
                self.restore_lines(snapshots);
                Err(self.reject(key, MutationStage::LiabilityCheck, e))
            }
        }
    }

    fn reject(&mut self, key: OfferKey, stage: MutationStage, err: EngineError) -> EngineError {
        if err.is_fatal() {
            return self.fail(err);
        }
        warn!(offer = %key, ?stage, kind = ?err.kind(), error = %err, "Offer mutation rejected");
        self.emit_event(EventPayload::MutationRejected(MutationRejectedEvent {
            seller_id: key.seller_id,
            offer_id: key.offer_id,
            kind: err.kind(),
            reason: err.to_string(),
        }));
        err
    }

    fn snapshot_lines<'o>(&self, offers: impl Iterator<Item = &'o Offer>) -> LineSnapshots {
        let mut snapshots = LineSnapshots::new();
        for offer in offers {
            for asset in [&offer.selling, &offer.buying] {
                if let Some(entry) = line_entry(&self.balances, &offer.seller_id, asset) {
                    snapshots.insert(entry.key(), entry);
                }
            }
        }
        snapshots
    }

    fn restore_lines(&mut self, snapshots: LineSnapshots) {
        for (_, entry) in snapshots {
            match entry {
                LedgerEntry::Account(acc) => {
                    let id = acc.account_id;
                    self.balances.restore_account(&id, Some(acc));
                }
                LedgerEntry::TrustLine(tl) => {
                    let (id, asset) = (tl.account_id, tl.asset.clone());
                    self.balances.restore_trust_line(&id, &asset, Some(tl));
                }
                LedgerEntry::Offer(_) => {}
            }
        }
    }
}

fn line_entry(balances: &BalanceStore, account_id: &AccountId, asset: &Asset) -> Option<LedgerEntry> {
    match asset {
        Asset::Native => balances.account(account_id).cloned().map(LedgerEntry::Account),
        Asset::Credit { .. } => balances
            .trust_line(account_id, asset)
            .cloned()
            .map(LedgerEntry::TrustLine),
    }
}

/// Writes the entity, then records every touched balance record. Returns the
/// offer as stored (with its assigned id), or `None` for a delete.
#[allow(clippy::too_many_arguments)]
fn persist(
    store: &mut OfferStore,
    balances: &mut BalanceStore,
    id_pool: &mut IdPool,
    open: &mut OpenLedger,
    snapshots: &LineSnapshots,
    line_changes: &[LineChange],
    after: Option<Offer>,
    key: &OfferKey,
    write: EntityWrite,
) -> Result<Option<Offer>, EngineError> {
    let seq = open.seq;

    let stored = match (write, after) {
        (EntityWrite::Add, Some(mut offer)) => {
            if offer.offer_id.is_unassigned() {
                offer.offer_id = id_pool.next_id().ok_or(EngineError::IdsExhausted)?;
            } else {
                id_pool.observe(offer.offer_id);
            }
            Some(store.add(offer, seq, &mut open.delta)?.offer)
        }
        (EntityWrite::Update, Some(offer)) => {
            store.update(offer.clone(), seq, &mut open.delta)?;
            Some(offer)
        }
        (EntityWrite::Delete, None) => {
            store.delete(&key.seller_id, key.offer_id, &mut open.delta)?;
            None
        }
        _ => {
            return Err(LiabilityError::InternalInconsistency(format!(
                "mutation of {key} has no matching entity write"
            ))
            .into())
        }
    };

    for change in line_changes {
        let line_key = LedgerKey::balance_line(change.account_id, &change.asset);
        let before = snapshots.get(&line_key).cloned().ok_or_else(|| {
            LiabilityError::InternalInconsistency(format!("no snapshot for {line_key:?}"))
        })?;

        let after = match &change.asset {
            Asset::Native => balances.account_mut(&change.account_id).map(|acc| {
                acc.last_modified = seq;
                LedgerEntry::Account(acc.clone())
            }),
            Asset::Credit { .. } => balances
                .trust_line_mut(&change.account_id, &change.asset)
                .map(|tl| {
                    tl.last_modified = seq;
                    LedgerEntry::TrustLine(tl.clone())
                }),
        }
        .ok_or_else(|| LiabilityError::InternalInconsistency(format!("{line_key:?} vanished after liability check")))?;

        open.delta.record_modify(before, after)?;
    }

    Ok(stored)
}
