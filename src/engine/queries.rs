//! Read-only views over the book. None of these touch liabilities or entities.

use super::core::OfferBook;
use super::results::EngineError;
use crate::balances::BalanceProvider;
use crate::liabilities::{self, Liabilities};
use crate::offer::Offer;
use crate::selector::{self, PriceLevel};
use crate::types::{AccountId, Asset, LedgerRange, OfferId};
use std::collections::BTreeMap;

impl OfferBook {
    /// Best offers selling `selling` for `buying`, capped at the network page size.
    pub fn best_offers(&self, max_count: usize, offset: usize, selling: &Asset, buying: &Asset) -> Vec<Offer> {
        let max_count = max_count.min(self.config.network.max_offers_page);
        self.store.best_offers(max_count, offset, selling, buying)
    }

    /// Resting offers `taker` could execute against, best first.
    pub fn crossing_offers(&self, taker: &Offer, max_count: usize) -> Vec<Offer> {
        // mirrored pair, and the book is price ordered, so stop at the first miss
        self.best_offers(max_count, 0, &taker.buying, &taker.selling)
            .into_iter()
            .take_while(|resting| taker.can_cross(resting))
            .collect()
    }

    pub fn price_levels(&self, selling: &Asset, buying: &Asset, max_levels: usize) -> Vec<PriceLevel> {
        selector::price_levels(self.store.table(), selling, buying, max_levels)
    }

    pub fn load_offer(&self, seller_id: &AccountId, offer_id: OfferId) -> Option<Offer> {
        self.store.load_by_id(seller_id, offer_id)
    }

    /// Offers of one account touching `asset`. Slow path.
    pub fn offers_for_account_and_asset(&self, account_id: &AccountId, asset: &Asset) -> Vec<Offer> {
        self.store.load_all_for_account_and_asset(account_id, asset)
    }

    /// Every offer grouped by seller. Requires `allow_full_scan`.
    pub fn load_all_offers(&self) -> Result<BTreeMap<AccountId, Vec<Offer>>, EngineError> {
        Ok(self.store.load_all_offers()?)
    }

    pub fn count_offers(&self, range: Option<LedgerRange>) -> u64 {
        self.store.count_objects(range)
    }

    pub fn liabilities(&self, account_id: &AccountId, asset: &Asset) -> Option<Liabilities> {
        self.balances.liabilities(account_id, asset)
    }

    /// How much more of `asset` the account could commit to selling right now.
    pub fn selling_capacity(&self, account_id: &AccountId, asset: &Asset) -> i64 {
        liabilities::selling_capacity(&self.balances, account_id, asset)
    }

    /// How much more of `asset` the account could commit to receiving right now.
    pub fn buying_capacity(&self, account_id: &AccountId, asset: &Asset) -> i64 {
        liabilities::buying_capacity(&self.balances, account_id, asset)
    }

    pub fn minimum_balance(&self, account_id: &AccountId) -> Option<i64> {
        self.balances
            .account(account_id)
            .map(|acc| acc.minimum_balance(self.balances.base_reserve()))
    }
}
