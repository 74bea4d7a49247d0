//! Account and trust-line balance records.
//!
//! These records belong to the surrounding ledger. This crate reads their
//! balances, reserves and limits, and owns only the liability counters
//! attached to them, which are writable solely through
//! [`crate::liabilities::LiabilityLedger`].

use crate::liabilities::Liabilities;
use crate::types::{AccountId, Asset, LedgerSeq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// 10.0: native balance holder. the minimum reserve scales with sub-entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub num_sub_entries: u32,
    pub last_modified: LedgerSeq,
    liabilities: Liabilities,
}

impl AccountEntry {
    pub fn new(account_id: AccountId, balance: i64) -> Self {
        Self {
            account_id,
            balance,
            num_sub_entries: 0,
            last_modified: LedgerSeq::GENESIS,
            liabilities: Liabilities::default(),
        }
    }

    pub fn with_sub_entries(mut self, num_sub_entries: u32) -> Self {
        self.num_sub_entries = num_sub_entries;
        self
    }

    pub fn liabilities(&self) -> Liabilities {
        self.liabilities
    }

    pub(crate) fn liabilities_mut(&mut self) -> &mut Liabilities {
        &mut self.liabilities
    }

    // (2 + sub entries) * base reserve, saturating
    pub fn minimum_balance(&self, base_reserve: i64) -> i64 {
        (2i64 + self.num_sub_entries as i64).saturating_mul(base_reserve)
    }
}

// 10.1: per-asset balance with an explicit holding limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    pub balance: i64,
    pub limit: i64,
    pub authorized: bool,
    pub last_modified: LedgerSeq,
    liabilities: Liabilities,
}

impl TrustLineEntry {
    pub fn new(account_id: AccountId, asset: Asset, balance: i64, limit: i64) -> Self {
        Self {
            account_id,
            asset,
            balance,
            limit,
            authorized: true,
            last_modified: LedgerSeq::GENESIS,
            liabilities: Liabilities::default(),
        }
    }

    pub fn unauthorized(mut self) -> Self {
        self.authorized = false;
        self
    }

    pub fn liabilities(&self) -> Liabilities {
        self.liabilities
    }

    pub(crate) fn liabilities_mut(&mut self) -> &mut Liabilities {
        &mut self.liabilities
    }
}

/// Snapshot of one balance record as seen by the liability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceLine {
    pub balance: i64,
    /// Balance that must stay untouched (minimum reserve for native, 0 for trust lines).
    pub floor: i64,
    /// Largest balance the record may hold (trust limit, or `i64::MAX` for native).
    pub ceiling: i64,
    pub authorized: bool,
    pub liabilities: Liabilities,
}

impl BalanceLine {
    /// `balance - floor - selling`. Negative when the record is already over-committed.
    pub fn available_to_sell(&self) -> i128 {
        self.balance as i128 - self.floor as i128 - self.liabilities.selling() as i128
    }

    /// `ceiling - balance - buying`.
    pub fn available_to_buy(&self) -> i128 {
        self.ceiling as i128 - self.balance as i128 - self.liabilities.buying() as i128
    }
}

/// Supplies balance records to the liability checks.
pub trait BalanceProvider {
    fn base_reserve(&self) -> i64;

    fn account(&self, account_id: &AccountId) -> Option<&AccountEntry>;

    fn account_mut(&mut self, account_id: &AccountId) -> Option<&mut AccountEntry>;

    fn trust_line(&self, account_id: &AccountId, asset: &Asset) -> Option<&TrustLineEntry>;

    fn trust_line_mut(&mut self, account_id: &AccountId, asset: &Asset) -> Option<&mut TrustLineEntry>;

    /// Native assets resolve to the account record, credit assets to the trust line.
    fn balance_line(&self, account_id: &AccountId, asset: &Asset) -> Option<BalanceLine> {
        match asset {
            Asset::Native => self.account(account_id).map(|acc| BalanceLine {
                balance: acc.balance,
                floor: acc.minimum_balance(self.base_reserve()),
                ceiling: i64::MAX,
                authorized: true,
                liabilities: acc.liabilities(),
            }),
            Asset::Credit { .. } => self.trust_line(account_id, asset).map(|tl| BalanceLine {
                balance: tl.balance,
                floor: 0,
                ceiling: tl.limit,
                authorized: tl.authorized,
                liabilities: tl.liabilities(),
            }),
        }
    }
}

/// In-memory balance records, ordered for deterministic audits.
#[derive(Debug, Clone, Default)]
pub struct BalanceStore {
    base_reserve: i64,
    accounts: BTreeMap<AccountId, AccountEntry>,
    trust_lines: BTreeMap<(AccountId, Asset), TrustLineEntry>,
}

impl BalanceStore {
    pub fn new(base_reserve: i64) -> Self {
        Self {
            base_reserve,
            accounts: BTreeMap::new(),
            trust_lines: BTreeMap::new(),
        }
    }

    pub fn set_base_reserve(&mut self, base_reserve: i64) {
        self.base_reserve = base_reserve;
    }

    pub fn insert_account(&mut self, account: AccountEntry) -> Option<AccountEntry> {
        self.accounts.insert(account.account_id, account)
    }

    pub fn insert_trust_line(&mut self, trust_line: TrustLineEntry) -> Option<TrustLineEntry> {
        self.trust_lines
            .insert((trust_line.account_id, trust_line.asset.clone()), trust_line)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountEntry> {
        self.accounts.values()
    }

    pub fn trust_lines(&self) -> impl Iterator<Item = &TrustLineEntry> {
        self.trust_lines.values()
    }

    /// Sets the balance of an existing record, leaving its liabilities alone.
    /// Returns false if there is no such record.
    pub fn set_balance(&mut self, account_id: &AccountId, asset: &Asset, balance: i64) -> bool {
        match asset {
            Asset::Native => self.account_mut(account_id).map(|acc| acc.balance = balance).is_some(),
            Asset::Credit { .. } => self
                .trust_line_mut(account_id, asset)
                .map(|tl| tl.balance = balance)
                .is_some(),
        }
    }

    /// Liability counters of the record backing `asset` for `account_id`.
    pub fn liabilities(&self, account_id: &AccountId, asset: &Asset) -> Option<Liabilities> {
        self.balance_line(account_id, asset).map(|line| line.liabilities)
    }

    pub(crate) fn restore_account(&mut self, account_id: &AccountId, entry: Option<AccountEntry>) {
        match entry {
            Some(acc) => {
                self.accounts.insert(*account_id, acc);
            }
            None => {
                self.accounts.remove(account_id);
            }
        }
    }

    pub(crate) fn restore_trust_line(
        &mut self,
        account_id: &AccountId,
        asset: &Asset,
        entry: Option<TrustLineEntry>,
    ) {
        let key = (*account_id, asset.clone());
        match entry {
            Some(tl) => {
                self.trust_lines.insert(key, tl);
            }
            None => {
                self.trust_lines.remove(&key);
            }
        }
    }
}

impl BalanceProvider for BalanceStore {
    fn base_reserve(&self) -> i64 {
        self.base_reserve
    }

    fn account(&self, account_id: &AccountId) -> Option<&AccountEntry> {
        self.accounts.get(account_id)
    }

    fn account_mut(&mut self, account_id: &AccountId) -> Option<&mut AccountEntry> {
        self.accounts.get_mut(account_id)
    }

    fn trust_line(&self, account_id: &AccountId, asset: &Asset) -> Option<&TrustLineEntry> {
        self.trust_lines.get(&(*account_id, asset.clone()))
    }

    fn trust_line_mut(&mut self, account_id: &AccountId, asset: &Asset) -> Option<&mut TrustLineEntry> {
        self.trust_lines.get_mut(&(*account_id, asset.clone()))
    }
}
