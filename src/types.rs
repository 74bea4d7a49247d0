// 1.0: all the primitives live here. nothing in the book works without these types.
// account keys, offer ids, ledger sequences, assets, timestamps. each is a newtype so the
// compiler catches type mixups.

use serde::{Deserialize, Serialize};
use std::fmt;

// 1.1: 32-byte account key. ordering is bytewise so every node sorts accounts identically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    // big-endian id in the trailing 8 bytes. handy for fixtures and the simulator.
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn short_hex(&self) -> String {
        self.0[24..].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId(..{})", self.short_hex())
    }
}

// 1.2: offer identifier. 0 on a request means "assign the next id from the pool".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferId(pub u64);

impl OfferId {
    pub const UNASSIGNED: OfferId = OfferId(0);

    pub fn is_unassigned(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: ledger sequence number. every stored entry remembers the ledger that last touched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerSeq(pub u32);

impl LedgerSeq {
    pub const GENESIS: LedgerSeq = LedgerSeq(1);

    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LedgerSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of ledger sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRange {
    pub first: LedgerSeq,
    pub last: LedgerSeq,
}

impl LedgerRange {
    pub fn new(first: LedgerSeq, last: LedgerSeq) -> Option<Self> {
        if first <= last {
            Some(Self { first, last })
        } else {
            None
        }
    }

    pub fn contains(&self, seq: LedgerSeq) -> bool {
        self.first <= seq && seq <= self.last
    }
}

// 1.4: asset code. 1 to 12 ascii alphanumerics, same rule as the network's credit assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetCode(String);

impl AssetCode {
    pub const MAX_LEN: usize = 12;

    #[must_use]
    pub fn new(code: &str) -> Option<Self> {
        let valid_len = !code.is_empty() && code.len() <= Self::MAX_LEN;
        if valid_len && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Some(Self(code.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 1.5: asset identity. native needs nothing, credit assets carry code + issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Credit { code: AssetCode, issuer: AccountId },
}

impl Asset {
    #[must_use]
    pub fn credit(code: &str, issuer: AccountId) -> Option<Self> {
        AssetCode::new(code).map(|code| Asset::Credit { code, issuer })
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    pub fn issuer(&self) -> Option<&AccountId> {
        match self {
            Asset::Native => None,
            Asset::Credit { issuer, .. } => Some(issuer),
        }
    }

    // issuers hold unlimited amounts of their own asset, so they never carry liabilities for it
    pub fn is_issued_by(&self, account: &AccountId) -> bool {
        self.issuer() == Some(account)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Credit { code, issuer } => write!(f, "{}:..{}", code, issuer.short_hex()),
        }
    }
}

// 1.6: millisecond timestamp. ledger close times only, never used for ordering offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}
