// 8.0.2: result types and errors for offer book operations.

use crate::config::ConfigError;
use crate::delta::{DeltaError, EntryChange};
use crate::entries::LedgerKey;
use crate::liabilities::{Liabilities, LiabilityError, LineChange};
use crate::offer::{Offer, OfferError, OfferKey};
use crate::price::PriceError;
use crate::store::StoreError;
use crate::types::{AccountId, Asset, LedgerSeq, Timestamp};
use serde::{Deserialize, Serialize};

/// Where an offer mutation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationStage {
    Proposed,
    LiabilityCheck,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub key: OfferKey,
    pub stage: MutationStage,
    pub before: Option<Offer>,
    pub after: Option<Offer>,
    pub line_changes: Vec<LineChange>,
    /// What the seller receives if the resting offer is taken in full. 0 for deletes.
    pub receivable: i64,
}

impl MutationOutcome {
    pub fn is_delete(&self) -> bool {
        self.after.is_none()
    }
}

/// Everything one ledger close changed, one entry per entity, in key order.
#[derive(Debug, Clone)]
pub struct LedgerCloseSummary {
    pub ledger_seq: LedgerSeq,
    pub close_time: Timestamp,
    pub changes: Vec<(LedgerKey, EntryChange)>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl LedgerCloseSummary {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// A balance record whose stored liabilities disagree with its open offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiabilityMismatch {
    pub account_id: AccountId,
    pub asset: Asset,
    /// `None` when offers reference a record that does not exist.
    pub recorded: Option<Liabilities>,
    pub expected_buying: i128,
    pub expected_selling: i128,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub offers_scanned: usize,
    pub lines_checked: usize,
}

/// Error categories surfaced to operation frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ArithmeticOverflow,
    InsufficientBalance,
    EntityNotFound,
    EntityAlreadyExists,
    InternalInconsistency,
    Malformed,
    NoBalanceLine,
    NotAuthorized,
    State,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Liability error: {0}")]
    Liability(#[from] LiabilityError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Arithmetic overflow: {0}")]
    Price(#[from] PriceError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Seller account {0:?} not found")]
    AccountNotFound(AccountId),

    #[error("Offer amount must be positive to create an offer")]
    EmptyOffer,

    #[error("No ledger close is open")]
    NoOpenLedger,

    #[error("Ledger {0} is already open")]
    LedgerAlreadyOpen(LedgerSeq),

    #[error("Ledger sequence exhausted after {0}")]
    SequenceExhausted(LedgerSeq),

    #[error("Offer id space exhausted")]
    IdsExhausted,

    #[error("Engine halted: {0}")]
    Halted(String),

    #[error("Liability audit failed with {} mismatched records", .0.len())]
    AuditFailed(Vec<LiabilityMismatch>),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Liability(e) => match e {
                LiabilityError::ArithmeticOverflow(_) => ErrorKind::ArithmeticOverflow,
                LiabilityError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
                LiabilityError::NoBalanceLine { .. } => ErrorKind::NoBalanceLine,
                LiabilityError::NotAuthorized { .. } => ErrorKind::NotAuthorized,
                LiabilityError::InternalInconsistency(_) => ErrorKind::InternalInconsistency,
            },
            EngineError::Store(e) => match e {
                StoreError::EntityNotFound(_) => ErrorKind::EntityNotFound,
                StoreError::EntityAlreadyExists(_) => ErrorKind::EntityAlreadyExists,
                StoreError::Malformed(_) | StoreError::UnassignedId => ErrorKind::Malformed,
                StoreError::FullScanDisabled => ErrorKind::State,
                // the delta only rejects writes the book should never have issued
                StoreError::Delta(_) => ErrorKind::InternalInconsistency,
            },
            EngineError::Price(_) => ErrorKind::ArithmeticOverflow,
            EngineError::Config(_) => ErrorKind::Malformed,
            EngineError::AccountNotFound(_) => ErrorKind::NoBalanceLine,
            EngineError::EmptyOffer => ErrorKind::Malformed,
            EngineError::NoOpenLedger
            | EngineError::LedgerAlreadyOpen(_)
            | EngineError::SequenceExhausted(_)
            | EngineError::IdsExhausted
            | EngineError::Halted(_) => ErrorKind::State,
            EngineError::AuditFailed(_) => ErrorKind::InternalInconsistency,
        }
    }

    /// Fatal errors abort the open ledger close and halt the book.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::InternalInconsistency
    }
}

impl From<OfferError> for EngineError {
    fn from(e: OfferError) -> Self {
        EngineError::Store(StoreError::Malformed(e))
    }
}

impl From<DeltaError> for EngineError {
    fn from(e: DeltaError) -> Self {
        EngineError::Store(StoreError::Delta(e))
    }
}
