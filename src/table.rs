//! Offer persistence session.
//!
//! [`OfferTable`] is the narrow storage interface the offer store writes
//! through: upsert/remove keyed by `(seller, offer_id)` and ordered selects
//! keyed by `(selling, buying, price, offer_id)`. [`MemoryOfferTable`]
//! keeps both orderings in `BTreeMap`s.

use crate::entries::OfferRecord;
use crate::offer::{Offer, OfferKey};
use crate::price::Price;
use crate::types::{AccountId, Asset, OfferId};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub trait OfferTable {
    fn get(&self, key: &OfferKey) -> Option<&OfferRecord>;

    /// The record holding `offer_id`, whichever seller owns it.
    fn get_by_id(&self, offer_id: OfferId) -> Option<&OfferRecord>;

    /// Inserts or replaces; returns the previous record.
    fn upsert(&mut self, record: OfferRecord) -> Option<OfferRecord>;

    fn remove(&mut self, key: &OfferKey) -> Option<OfferRecord>;

    /// Offers selling `selling` for `buying`, lowest price first, then lowest id.
    fn select_pair(&self, selling: &Asset, buying: &Asset, offset: usize, limit: usize) -> Vec<&OfferRecord>;

    /// All offers of one seller in offer-id order.
    fn select_seller(&self, seller_id: &AccountId) -> Vec<&OfferRecord>;

    /// Every record in key order.
    fn scan(&self) -> Box<dyn Iterator<Item = &OfferRecord> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Drops every record `keep` rejects. Returns how many were removed.
    fn retain(&mut self, keep: &mut dyn FnMut(&OfferRecord) -> bool) -> usize;
}

/// Book position: price by value, then offer id. Earlier ids win ties.
/// The seller only separates records that share an id.
#[derive(Debug, Clone, Copy)]
struct BookKey {
    price: Price,
    offer_id: OfferId,
    seller_id: AccountId,
}

impl PartialEq for BookKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BookKey {}

impl PartialOrd for BookKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BookKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.price
            .compare(&other.price)
            .then(self.offer_id.cmp(&other.offer_id))
            .then(self.seller_id.cmp(&other.seller_id))
    }
}

type PairKey = (Asset, Asset);

#[derive(Debug, Clone, Default)]
pub struct MemoryOfferTable {
    records: BTreeMap<OfferKey, OfferRecord>,
    /// pair -> book position -> record key
    books: BTreeMap<PairKey, BTreeMap<BookKey, OfferKey>>,
    ids: BTreeMap<OfferId, OfferKey>,
}

impl MemoryOfferTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn book_key(offer: &Offer) -> BookKey {
        BookKey {
            price: offer.price,
            offer_id: offer.offer_id,
            seller_id: offer.seller_id,
        }
    }

    fn index(&mut self, record: &OfferRecord) {
        let offer = &record.offer;
        self.books
            .entry((offer.selling.clone(), offer.buying.clone()))
            .or_default()
            .insert(Self::book_key(offer), offer.key());
        self.ids.insert(offer.offer_id, offer.key());
    }

    fn unindex(&mut self, record: &OfferRecord) {
        let offer = &record.offer;
        let pair = (offer.selling.clone(), offer.buying.clone());
        if let Some(book) = self.books.get_mut(&pair) {
            book.remove(&Self::book_key(offer));
            if book.is_empty() {
                self.books.remove(&pair);
            }
        }
        if self.ids.get(&offer.offer_id) == Some(&offer.key()) {
            self.ids.remove(&offer.offer_id);
        }
    }

    /// Number of distinct asset pairs with at least one offer.
    pub fn pair_count(&self) -> usize {
        self.books.len()
    }
}

impl OfferTable for MemoryOfferTable {
    fn get(&self, key: &OfferKey) -> Option<&OfferRecord> {
        self.records.get(key)
    }

    fn get_by_id(&self, offer_id: OfferId) -> Option<&OfferRecord> {
        self.ids.get(&offer_id).and_then(|key| self.records.get(key))
    }

    fn upsert(&mut self, record: OfferRecord) -> Option<OfferRecord> {
        let previous = self.records.remove(&record.key());
        if let Some(prev) = &previous {
            self.unindex(prev);
        }
        self.index(&record);
        self.records.insert(record.key(), record);
        previous
    }

    fn remove(&mut self, key: &OfferKey) -> Option<OfferRecord> {
        let removed = self.records.remove(key)?;
        self.unindex(&removed);
        Some(removed)
    }

    fn select_pair(&self, selling: &Asset, buying: &Asset, offset: usize, limit: usize) -> Vec<&OfferRecord> {
        let Some(book) = self.books.get(&(selling.clone(), buying.clone())) else {
            return Vec::new();
        };
        book.values()
            .skip(offset)
            .take(limit)
            .filter_map(|key| self.records.get(key))
            .collect()
    }

    fn select_seller(&self, seller_id: &AccountId) -> Vec<&OfferRecord> {
        let lo = OfferKey::new(*seller_id, OfferId(0));
        let hi = OfferKey::new(*seller_id, OfferId(u64::MAX));
        self.records.range(lo..=hi).map(|(_, rec)| rec).collect()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = &OfferRecord> + '_> {
        Box::new(self.records.values())
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn clear(&mut self) {
        self.records.clear();
        self.books.clear();
        self.ids.clear();
    }

    fn retain(&mut self, keep: &mut dyn FnMut(&OfferRecord) -> bool) -> usize {
        let doomed: Vec<OfferKey> = self
            .records
            .values()
            .filter(|&rec| !keep(rec))
            .map(|rec| rec.key())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }
}
