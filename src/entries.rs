// 11.0: generic ledger entries. the change delta speaks in these so account, trust-line and
// offer mutations land in one ordered record per ledger close.

use crate::balances::{AccountEntry, TrustLineEntry};
use crate::offer::{Offer, OfferKey};
use crate::types::{AccountId, Asset, LedgerSeq};
use serde::{Deserialize, Serialize};

/// A stored offer together with the ledger that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub offer: Offer,
    pub last_modified: LedgerSeq,
}

impl OfferRecord {
    pub fn new(offer: Offer, last_modified: LedgerSeq) -> Self {
        Self { offer, last_modified }
    }

    pub fn key(&self) -> OfferKey {
        self.offer.key()
    }
}

// variant order fixes the order keys are reported in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerKey {
    Account(AccountId),
    TrustLine { account_id: AccountId, asset: Asset },
    Offer(OfferKey),
}

impl LedgerKey {
    /// Key of the record backing `asset` for `account_id`.
    pub fn balance_line(account_id: AccountId, asset: &Asset) -> Self {
        match asset {
            Asset::Native => LedgerKey::Account(account_id),
            Asset::Credit { .. } => LedgerKey::TrustLine {
                account_id,
                asset: asset.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntry {
    Account(AccountEntry),
    TrustLine(TrustLineEntry),
    Offer(OfferRecord),
}

impl LedgerEntry {
    pub fn key(&self) -> LedgerKey {
        match self {
            LedgerEntry::Account(acc) => LedgerKey::Account(acc.account_id),
            LedgerEntry::TrustLine(tl) => LedgerKey::TrustLine {
                account_id: tl.account_id,
                asset: tl.asset.clone(),
            },
            LedgerEntry::Offer(rec) => LedgerKey::Offer(rec.key()),
        }
    }

    pub fn last_modified(&self) -> LedgerSeq {
        match self {
            LedgerEntry::Account(acc) => acc.last_modified,
            LedgerEntry::TrustLine(tl) => tl.last_modified,
            LedgerEntry::Offer(rec) => rec.last_modified,
        }
    }

    pub fn as_offer(&self) -> Option<&OfferRecord> {
        match self {
            LedgerEntry::Offer(rec) => Some(rec),
            _ => None,
        }
    }
}
