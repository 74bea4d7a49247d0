// 2.0: best-offer selection. read-only views over the book for matching logic and diagnostics.
// price-time priority: lowest price first, then lowest (earliest) offer id.

use crate::offer::Offer;
use crate::price::Price;
use crate::table::OfferTable;
use crate::types::Asset;
use std::cmp::Ordering;

/// Up to `max_count` offers selling `selling` for `buying`, skipping the first `offset`.
///
/// A taker who wants `selling` and pays with `buying` should cross these in
/// order. Pages are not stable across writes.
pub fn best_offers<T: OfferTable + ?Sized>(
    table: &T,
    max_count: usize,
    offset: usize,
    selling: &Asset,
    buying: &Asset,
) -> Vec<Offer> {
    if max_count == 0 {
        return Vec::new();
    }
    table
        .select_pair(selling, buying, offset, max_count)
        .into_iter()
        .map(|rec| rec.offer.clone())
        .collect()
}

// 2.1: aggregated depth at one price
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
    pub price: Price,
    pub total_amount: i128,
    pub offer_count: usize,
}

/// Book depth grouped by price value, best level first.
pub fn price_levels<T: OfferTable + ?Sized>(
    table: &T,
    selling: &Asset,
    buying: &Asset,
    max_levels: usize,
) -> Vec<PriceLevel> {
    let mut levels: Vec<PriceLevel> = Vec::new();

    for rec in table.select_pair(selling, buying, 0, usize::MAX) {
        let offer = &rec.offer;
        let same_level = levels
            .last()
            .map(|level| level.price.compare(&offer.price) == Ordering::Equal)
            .unwrap_or(false);

        if !same_level {
            if levels.len() >= max_levels {
                break;
            }
            levels.push(PriceLevel {
                price: offer.price,
                total_amount: 0,
                offer_count: 0,
            });
        }
        if let Some(level) = levels.last_mut() {
            level.total_amount += offer.amount as i128;
            level.offer_count += 1;
        }
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::OfferRecord;
    use crate::offer::OfferFlags;
    use crate::table::MemoryOfferTable;
    use crate::types::{AccountId, LedgerSeq, OfferId};

    fn usd() -> Asset {
        Asset::credit("USD", AccountId::from_u64(50)).unwrap()
    }

    fn table_with(offers: &[(u64, i32, i32, i64)]) -> MemoryOfferTable {
        let mut table = MemoryOfferTable::new();
        for &(id, n, d, amount) in offers {
            let offer = Offer::new(
                AccountId::from_u64(id),
                OfferId(id),
                Asset::Native,
                usd(),
                amount,
                Price::new(n, d).unwrap(),
                OfferFlags::NONE,
            );
            table.upsert(OfferRecord::new(offer, LedgerSeq(1)));
        }
        table
    }

    #[test]
    fn price_time_priority() {
        let table = table_with(&[(10, 3, 2, 1), (5, 3, 2, 1), (7, 1, 1, 1)]);
        let best = best_offers(&table, 10, 0, &Asset::Native, &usd());
        let ids: Vec<u64> = best.iter().map(|o| o.offer_id.0).collect();
        assert_eq!(ids, vec![7, 5, 10]);
    }

    #[test]
    fn pagination() {
        let table = table_with(&[(1, 1, 1, 1), (2, 2, 1, 1), (3, 3, 1, 1), (4, 4, 1, 1)]);

        let page1 = best_offers(&table, 2, 0, &Asset::Native, &usd());
        let page2 = best_offers(&table, 2, 2, &Asset::Native, &usd());
        let page3 = best_offers(&table, 2, 4, &Asset::Native, &usd());

        assert_eq!(page1.iter().map(|o| o.offer_id.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(page2.iter().map(|o| o.offer_id.0).collect::<Vec<_>>(), vec![3, 4]);
        assert!(page3.is_empty());
        assert!(best_offers(&table, 0, 0, &Asset::Native, &usd()).is_empty());
    }

    #[test]
    fn opposite_pair_is_separate() {
        let table = table_with(&[(1, 1, 1, 1)]);
        assert!(best_offers(&table, 10, 0, &usd(), &Asset::Native).is_empty());
    }

    #[test]
    fn levels_group_equal_values() {
        let table = table_with(&[(1, 1, 2, 10), (2, 2, 4, 5), (3, 1, 1, 7)]);
        let levels = price_levels(&table, &Asset::Native, &usd(), 10);

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].total_amount, 15);
        assert_eq!(levels[0].offer_count, 2);
        assert_eq!(levels[1].price, Price::new(1, 1).unwrap());

        assert_eq!(price_levels(&table, &Asset::Native, &usd(), 1).len(), 1);
    }
}
