//! Single-writer, multi-reader access to an [`OfferBook`].
//!
//! A ledger close holds the write lock from `begin_ledger` to commit or
//! abort, so readers never observe a half-applied close.

use super::core::OfferBook;
use super::results::{EngineError, LedgerCloseSummary};
use crate::offer::Offer;
use crate::types::{Asset, Timestamp};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SharedOfferBook {
    inner: Arc<RwLock<OfferBook>>,
}

impl SharedOfferBook {
    pub fn new(book: OfferBook) -> Self {
        Self {
            inner: Arc::new(RwLock::new(book)),
        }
    }

    /// Shared read access. Blocks while a ledger close is being applied.
    pub fn read(&self) -> RwLockReadGuard<'_, OfferBook> {
        self.inner.read()
    }

    pub fn best_offers(&self, max_count: usize, offset: usize, selling: &Asset, buying: &Asset) -> Vec<Offer> {
        self.inner.read().best_offers(max_count, offset, selling, buying)
    }

    /// Applies one ledger close under the write lock. If `apply` fails the
    /// close is aborted (unless a fatal error already did) and the error returned.
    pub fn close_ledger<F>(&self, close_time: Timestamp, apply: F) -> Result<LedgerCloseSummary, EngineError>
    where
        F: FnOnce(&mut OfferBook) -> Result<(), EngineError>,
    {
        let mut book = self.inner.write();
        book.begin_ledger(close_time)?;

        if let Err(e) = apply(&mut *book) {
            if book.open_ledger().is_some() {
                if let Err(abort_err) = book.abort_ledger() {
                    warn!(error = %abort_err, "Abort after failed close did not complete");
                }
            }
            return Err(e);
        }
        book.commit_ledger()
    }
}
