//! Offer entities.
//!
//! An offer is a resting order to sell `amount` of `selling` for `buying` at
//! `price` (buying units per selling unit) or better. Offers are keyed by
//! `(seller_id, offer_id)`.

use crate::price::{PriceError, Price, Rounding};
use crate::types::{AccountId, Asset, OfferId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Offer flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OfferFlags(u32);

impl OfferFlags {
    pub const NONE: OfferFlags = OfferFlags(0);
    /// Never take an offer priced exactly at this offer's own price.
    pub const PASSIVE: OfferFlags = OfferFlags(1);

    const KNOWN_BITS: u32 = Self::PASSIVE.0;

    #[must_use]
    pub fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::KNOWN_BITS == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: OfferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_passive(&self) -> bool {
        self.contains(Self::PASSIVE)
    }
}

/// Identity of a stored offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferKey {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
}

impl OfferKey {
    pub fn new(seller_id: AccountId, offer_id: OfferId) -> Self {
        Self { seller_id, offer_id }
    }
}

impl fmt::Display for OfferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer {} of {:?}", self.offer_id, self.seller_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub seller_id: AccountId,
    pub offer_id: OfferId,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub flags: OfferFlags,
}

impl Offer {
    pub fn new(
        seller_id: AccountId,
        offer_id: OfferId,
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
        flags: OfferFlags,
    ) -> Self {
        Self {
            seller_id,
            offer_id,
            selling,
            buying,
            amount,
            price,
            flags,
        }
    }

    pub fn key(&self) -> OfferKey {
        OfferKey::new(self.seller_id, self.offer_id)
    }

    pub fn is_passive(&self) -> bool {
        self.flags.is_passive()
    }

    pub fn validate(&self) -> Result<(), OfferError> {
        if self.amount < 0 {
            return Err(OfferError::NegativeAmount(self.amount));
        }
        if self.selling == self.buying {
            return Err(OfferError::SameAsset(self.selling.clone()));
        }
        if OfferFlags::from_bits(self.flags.bits()).is_none() {
            return Err(OfferError::UnknownFlags(self.flags.bits()));
        }
        Ok(())
    }

    /// Amount of `selling` reserved by this offer. Exact.
    pub fn selling_liabilities(&self) -> i64 {
        self.amount
    }

    /// Amount of `buying` this offer may receive, rounded up so the seller
    /// never under-reserves capacity for it.
    pub fn buying_liabilities(&self) -> Result<i64, PriceError> {
        self.price.counter_amount(self.amount, Rounding::Up)
    }

    /// Amount of `buying` the seller is guaranteed if the offer is taken in
    /// full. Rounded down, the counterpart of [`Offer::buying_liabilities`].
    pub fn receivable_amount(&self) -> Result<i64, PriceError> {
        self.price.counter_amount(self.amount, Rounding::Down)
    }

    /// Whether this offer, acting as the taker, may execute against `resting`.
    ///
    /// The pair must mirror this offer's pair. Passive offers only take
    /// strictly better prices.
    pub fn can_cross(&self, resting: &Offer) -> bool {
        if resting.selling != self.buying || resting.buying != self.selling {
            return false;
        }
        match resting.price.compare(&self.price.inverse()) {
            Ordering::Less => true,
            Ordering::Equal => !self.is_passive(),
            Ordering::Greater => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OfferError {
    #[error("Offer amount must not be negative, got {0}")]
    NegativeAmount(i64),

    #[error("Offer sells and buys the same asset {0}")]
    SameAsset(Asset),

    #[error("Unknown offer flag bits {0:#x}")]
    UnknownFlags(u32),
}
