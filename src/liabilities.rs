//! Liability accounting.
//!
//! Every balance record carries two running totals: `selling` (what open
//! offers may still take out of the record) and `buying` (what open offers
//! may still deliver into it). The ledger here is the only writer of those
//! totals and checks, before any write, that
//!
//! - `balance - floor - selling >= 0`, and
//! - `balance + buying <= ceiling`
//!
//! on every record whose liabilities grow. Changes touching several records
//! are validated in full before the first write, so a rejection leaves every
//! counter untouched.

use crate::balances::{BalanceLine, BalanceProvider};
use crate::offer::Offer;
use crate::price::PriceError;
use crate::types::{AccountId, Asset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiabilitySide {
    Selling,
    Buying,
}

impl fmt::Display for LiabilitySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiabilitySide::Selling => f.write_str("selling"),
            LiabilitySide::Buying => f.write_str("buying"),
        }
    }
}

/// Running totals reserved by open offers. Both are always >= 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Liabilities {
    buying: i64,
    selling: i64,
}

impl Liabilities {
    pub fn buying(&self) -> i64 {
        self.buying
    }

    pub fn selling(&self) -> i64 {
        self.selling
    }

    pub fn get(&self, side: LiabilitySide) -> i64 {
        match side {
            LiabilitySide::Selling => self.selling,
            LiabilitySide::Buying => self.buying,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.buying == 0 && self.selling == 0
    }

    #[cfg(test)]
    pub(crate) fn from_parts(buying: i64, selling: i64) -> Self {
        Self { buying, selling }
    }
}

impl fmt::Display for Liabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buying={} selling={}", self.buying, self.selling)
    }
}

/// One balance record whose liabilities were rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub account_id: AccountId,
    pub asset: Asset,
    pub before: Liabilities,
    pub after: Liabilities,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiabilityError {
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(#[from] PriceError),

    #[error("Insufficient {side} capacity for {account_id:?} in {asset}: requested {requested}, available {available}")]
    InsufficientBalance {
        account_id: AccountId,
        asset: Asset,
        side: LiabilitySide,
        requested: i64,
        available: i64,
    },

    #[error("No balance record for {account_id:?} in {asset}")]
    NoBalanceLine { account_id: AccountId, asset: Asset },

    #[error("Trust line of {account_id:?} for {asset} is not authorized")]
    NotAuthorized { account_id: AccountId, asset: Asset },

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl LiabilityError {
    /// True for programming errors that must halt the ledger close.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LiabilityError::InternalInconsistency(_))
    }
}

// net change per record, signed. i128 so summing two i64 deltas never wraps.
#[derive(Debug, Clone, Copy, Default)]
struct PendingDelta {
    buying: i128,
    selling: i128,
}

type PendingPlan = BTreeMap<(AccountId, Asset), PendingDelta>;

fn clamp_available(value: i128) -> i64 {
    value.clamp(0, i64::MAX as i128) as i64
}

/// How much more of `asset` the account could commit to selling.
pub fn selling_capacity<B: BalanceProvider + ?Sized>(balances: &B, account_id: &AccountId, asset: &Asset) -> i64 {
    if asset.is_issued_by(account_id) {
        return i64::MAX;
    }
    match balances.balance_line(account_id, asset) {
        Some(line) if line.authorized => clamp_available(line.available_to_sell()),
        _ => 0,
    }
}

/// How much more of `asset` the account could commit to receiving.
pub fn buying_capacity<B: BalanceProvider + ?Sized>(balances: &B, account_id: &AccountId, asset: &Asset) -> i64 {
    if asset.is_issued_by(account_id) {
        return i64::MAX;
    }
    match balances.balance_line(account_id, asset) {
        Some(line) if line.authorized => clamp_available(line.available_to_buy()),
        _ => 0,
    }
}

/// Acquires and releases liabilities against the records of a [`BalanceProvider`].
pub struct LiabilityLedger<'a, B: BalanceProvider + ?Sized> {
    balances: &'a mut B,
}

impl<'a, B: BalanceProvider + ?Sized> LiabilityLedger<'a, B> {
    pub fn new(balances: &'a mut B) -> Self {
        Self { balances }
    }

    /// Grows one liability total by `delta`. All-or-nothing.
    pub fn acquire(
        &mut self,
        account_id: &AccountId,
        asset: &Asset,
        side: LiabilitySide,
        delta: i64,
    ) -> Result<Option<LineChange>, LiabilityError> {
        if delta < 0 {
            return Err(LiabilityError::InternalInconsistency(format!(
                "negative acquire of {delta} {side} liabilities"
            )));
        }
        let mut plan = PendingPlan::new();
        Self::stage(&mut plan, account_id, asset, side, delta as i128);
        Ok(self.commit_plan(plan)?.pop())
    }

    /// Shrinks one liability total by `delta`. Releasing more than is recorded
    /// is an internal inconsistency.
    pub fn release(
        &mut self,
        account_id: &AccountId,
        asset: &Asset,
        side: LiabilitySide,
        delta: i64,
    ) -> Result<Option<LineChange>, LiabilityError> {
        if delta < 0 {
            return Err(LiabilityError::InternalInconsistency(format!(
                "negative release of {delta} {side} liabilities"
            )));
        }
        let mut plan = PendingPlan::new();
        Self::stage(&mut plan, account_id, asset, side, -(delta as i128));
        Ok(self.commit_plan(plan)?.pop())
    }

    /// Reserves both sides of a new offer.
    pub fn acquire_offer(&mut self, offer: &Offer) -> Result<Vec<LineChange>, LiabilityError> {
        self.apply_offer_change(None, Some(offer))
    }

    /// Returns both sides of a removed offer.
    pub fn release_offer(&mut self, offer: &Offer) -> Result<Vec<LineChange>, LiabilityError> {
        self.apply_offer_change(Some(offer), None)
    }

    /// Moves liabilities from `before` to `after` as one unit: releases what
    /// `before` reserved, acquires what `after` needs, and checks only the net
    /// result. Nothing is written unless every touched record passes.
    pub fn apply_offer_change(
        &mut self,
        before: Option<&Offer>,
        after: Option<&Offer>,
    ) -> Result<Vec<LineChange>, LiabilityError> {
        let mut plan = PendingPlan::new();

        if let Some(offer) = before {
            let buying = offer.buying_liabilities()?;
            Self::stage(&mut plan, &offer.seller_id, &offer.selling, LiabilitySide::Selling, -(offer.selling_liabilities() as i128));
            Self::stage(&mut plan, &offer.seller_id, &offer.buying, LiabilitySide::Buying, -(buying as i128));
        }
        if let Some(offer) = after {
            let buying = offer.buying_liabilities()?;
            Self::stage(&mut plan, &offer.seller_id, &offer.selling, LiabilitySide::Selling, offer.selling_liabilities() as i128);
            Self::stage(&mut plan, &offer.seller_id, &offer.buying, LiabilitySide::Buying, buying as i128);
        }

        self.commit_plan(plan)
    }

    pub fn selling_capacity(&self, account_id: &AccountId, asset: &Asset) -> i64 {
        selling_capacity(&*self.balances, account_id, asset)
    }

    pub fn buying_capacity(&self, account_id: &AccountId, asset: &Asset) -> i64 {
        buying_capacity(&*self.balances, account_id, asset)
    }

    fn stage(plan: &mut PendingPlan, account_id: &AccountId, asset: &Asset, side: LiabilitySide, delta: i128) {
        // issuers carry no liabilities for their own asset
        if asset.is_issued_by(account_id) {
            return;
        }
        let pending = plan.entry((*account_id, asset.clone())).or_default();
        match side {
            LiabilitySide::Selling => pending.selling += delta,
            LiabilitySide::Buying => pending.buying += delta,
        }
    }

    fn commit_plan(&mut self, plan: PendingPlan) -> Result<Vec<LineChange>, LiabilityError> {
        let mut staged = Vec::with_capacity(plan.len());

        for ((account_id, asset), pending) in plan {
            if pending.buying == 0 && pending.selling == 0 {
                continue;
            }
            let line = self.balances.balance_line(&account_id, &asset);
            let after = Self::check_line(&account_id, &asset, line, pending)?;
            // check_line only succeeds with a line present
            let before = line.map(|l| l.liabilities).unwrap_or_default();
            staged.push(LineChange {
                account_id,
                asset,
                before,
                after,
            });
        }

        for change in &staged {
            let slot = self.liabilities_slot(&change.account_id, &change.asset).ok_or_else(|| {
                LiabilityError::InternalInconsistency(format!(
                    "balance record for {:?} in {} vanished during commit",
                    change.account_id, change.asset
                ))
            })?;
            *slot = change.after;
            debug!(
                account = ?change.account_id,
                asset = %change.asset,
                before = %change.before,
                after = %change.after,
                "Liabilities updated"
            );
        }

        Ok(staged)
    }

    fn check_line(
        account_id: &AccountId,
        asset: &Asset,
        line: Option<BalanceLine>,
        pending: PendingDelta,
    ) -> Result<Liabilities, LiabilityError> {
        let Some(line) = line else {
            if pending.buying > 0 || pending.selling > 0 {
                return Err(LiabilityError::NoBalanceLine {
                    account_id: *account_id,
                    asset: asset.clone(),
                });
            }
            let msg = format!("release against missing balance record {account_id:?} in {asset}");
            error!(%msg, "Liability release without record");
            return Err(LiabilityError::InternalInconsistency(msg));
        };

        if (pending.buying > 0 || pending.selling > 0) && !line.authorized {
            return Err(LiabilityError::NotAuthorized {
                account_id: *account_id,
                asset: asset.clone(),
            });
        }

        let new_selling = line.liabilities.selling as i128 + pending.selling;
        let new_buying = line.liabilities.buying as i128 + pending.buying;

        if new_selling < 0 || new_buying < 0 {
            let msg = format!(
                "release exceeds recorded liabilities for {account_id:?} in {asset}: recorded {}, delta buying={} selling={}",
                line.liabilities, pending.buying, pending.selling
            );
            error!(%msg, "Liability underflow");
            return Err(LiabilityError::InternalInconsistency(msg));
        }

        if pending.selling > 0 {
            let available = line.balance as i128 - line.floor as i128 - new_selling;
            if available < 0 {
                return Err(LiabilityError::InsufficientBalance {
                    account_id: *account_id,
                    asset: asset.clone(),
                    side: LiabilitySide::Selling,
                    requested: clamp_available(pending.selling),
                    available: clamp_available(line.available_to_sell()),
                });
            }
        }

        if pending.buying > 0 {
            let headroom = line.ceiling as i128 - line.balance as i128 - new_buying;
            if headroom < 0 {
                return Err(LiabilityError::InsufficientBalance {
                    account_id: *account_id,
                    asset: asset.clone(),
                    side: LiabilitySide::Buying,
                    requested: clamp_available(pending.buying),
                    available: clamp_available(line.available_to_buy()),
                });
            }
        }

        // both checks above bound the totals by i64 balances, but a pure
        // release path can still land here with anything representable
        let selling = i64::try_from(new_selling)
            .map_err(|_| LiabilityError::InternalInconsistency("selling liabilities overflow".to_string()))?;
        let buying = i64::try_from(new_buying)
            .map_err(|_| LiabilityError::InternalInconsistency("buying liabilities overflow".to_string()))?;

        Ok(Liabilities { buying, selling })
    }

    fn liabilities_slot(&mut self, account_id: &AccountId, asset: &Asset) -> Option<&mut Liabilities> {
        match asset {
            Asset::Native => self.balances.account_mut(account_id).map(|acc| acc.liabilities_mut()),
            Asset::Credit { .. } => self
                .balances
                .trust_line_mut(account_id, asset)
                .map(|tl| tl.liabilities_mut()),
        }
    }
}
