//! Liability reconciliation.
//!
//! Recomputes every liability counter from a full offer scan and compares it
//! with what is stored. O(total offers); gated behind `allow_full_scan`.

use super::core::OfferBook;
use super::results::{AuditReport, EngineError, LiabilityMismatch};
use crate::balances::BalanceProvider;
use crate::types::{AccountId, Asset};
use std::collections::BTreeMap;
use tracing::{error, info};

#[derive(Debug, Default, Clone, Copy)]
struct Expected {
    buying: i128,
    selling: i128,
}

impl OfferBook {
    pub fn reconcile_liabilities(&self) -> Result<AuditReport, EngineError> {
        let by_seller = self.store.load_all_offers()?;

        let mut expected: BTreeMap<(AccountId, Asset), Expected> = BTreeMap::new();
        let mut offers_scanned = 0;
        for offer in by_seller.values().flatten() {
            offers_scanned += 1;
            let buying = offer.buying_liabilities()?;
            if !offer.selling.is_issued_by(&offer.seller_id) {
                expected
                    .entry((offer.seller_id, offer.selling.clone()))
                    .or_default()
                    .selling += offer.selling_liabilities() as i128;
            }
            if !offer.buying.is_issued_by(&offer.seller_id) {
                expected
                    .entry((offer.seller_id, offer.buying.clone()))
                    .or_default()
                    .buying += buying as i128;
            }
        }

        // every stored record with nonzero liabilities must be explained by an offer
        for acc in self.balances.accounts() {
            expected.entry((acc.account_id, Asset::Native)).or_default();
        }
        for tl in self.balances.trust_lines() {
            expected.entry((tl.account_id, tl.asset.clone())).or_default();
        }

        let mut mismatches = Vec::new();
        for ((account_id, asset), want) in &expected {
            let recorded = self.balances.liabilities(account_id, asset);
            let matches = match recorded {
                Some(rec) => rec.buying() as i128 == want.buying && rec.selling() as i128 == want.selling,
                None => want.buying == 0 && want.selling == 0,
            };
            if !matches {
                mismatches.push(LiabilityMismatch {
                    account_id: *account_id,
                    asset: asset.clone(),
                    recorded,
                    expected_buying: want.buying,
                    expected_selling: want.selling,
                });
            }
        }

        if !mismatches.is_empty() {
            error!(mismatched = mismatches.len(), offers_scanned, "Liability audit failed");
            return Err(EngineError::AuditFailed(mismatches));
        }

        let report = AuditReport {
            offers_scanned,
            lines_checked: expected.len(),
        };
        info!(offers_scanned, lines_checked = report.lines_checked, "Liability audit passed");
        Ok(report)
    }
}
