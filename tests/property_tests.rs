//! Property-based tests for price arithmetic and liability accounting.
//!
//! These tests verify invariants hold under random inputs.

use offer_ledger::*;
use proptest::prelude::*;
use std::cmp::Ordering;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Price> {
    (1i32..=i32::MAX, 1i32..=i32::MAX).prop_map(|(n, d)| Price::new(n, d).unwrap())
}

fn small_price_strategy() -> impl Strategy<Value = Price> {
    (1i32..1_000, 1i32..1_000).prop_map(|(n, d)| Price::new(n, d).unwrap())
}

fn amount_strategy() -> impl Strategy<Value = i64> {
    0i64..1_000_000_000_000
}

#[derive(Debug, Clone)]
enum Op {
    Acquire(LiabilitySide, i64),
    Release(LiabilitySide, i64),
}

fn side_strategy() -> impl Strategy<Value = LiabilitySide> {
    prop_oneof![Just(LiabilitySide::Selling), Just(LiabilitySide::Buying)]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (side_strategy(), 0i64..5_000).prop_map(|(s, d)| Op::Acquire(s, d)),
        (side_strategy(), 0i64..5_000).prop_map(|(s, d)| Op::Release(s, d)),
    ]
}

fn usd() -> Asset {
    Asset::credit("USD", AccountId::from_u64(77)).unwrap()
}

proptest! {
    /// compare agrees with exact cross multiplication
    #[test]
    fn compare_matches_cross_product(a in price_strategy(), b in price_strategy()) {
        let lhs = a.numerator() as i128 * b.denominator() as i128;
        let rhs = b.numerator() as i128 * a.denominator() as i128;
        prop_assert_eq!(a.compare(&b), lhs.cmp(&rhs));
        prop_assert_eq!(b.compare(&a), a.compare(&b).reverse());
    }

    /// scaling numerator and denominator never changes the value
    #[test]
    fn compare_ignores_representation(p in small_price_strategy(), k in 1i32..1_000) {
        let scaled = Price::new(p.numerator() * k, p.denominator() * k).unwrap();
        prop_assert_eq!(p.compare(&scaled), Ordering::Equal);
    }

    /// buying liabilities are the exact ceiling of amount * n / d
    #[test]
    fn buying_liabilities_round_up(amount in amount_strategy(), p in small_price_strategy()) {
        let up = p.counter_amount(amount, Rounding::Up).unwrap() as i128;
        let exact = amount as i128 * p.numerator() as i128;
        let d = p.denominator() as i128;
        prop_assert!(up * d >= exact);
        prop_assert!((up - 1) * d < exact || up == 0);
    }

    /// rounding down and up differ by at most one unit
    #[test]
    fn rounding_brackets_exact(amount in amount_strategy(), p in small_price_strategy()) {
        let down = p.counter_amount(amount, Rounding::Down).unwrap();
        let up = p.counter_amount(amount, Rounding::Up).unwrap();
        prop_assert!(down <= up);
        prop_assert!(up - down <= 1);
    }

    /// big_divide either fits or reports overflow, never wraps
    #[test]
    fn big_divide_never_wraps(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX, c in 1i64..=i64::MAX) {
        let exact = (a as i128 * b as i128) / c as i128;
        match big_divide(a, b, c, Rounding::Down) {
            Ok(v) => prop_assert_eq!(v as i128, exact),
            Err(PriceError::ArithmeticOverflow { .. }) => prop_assert!(exact > i64::MAX as i128),
            Err(e) => prop_assert!(false, "unexpected error {e:?}"),
        }
    }

    /// stored totals equal the net of every accepted call, and the reserve holds throughout
    #[test]
    fn liabilities_conserved_and_bounded(
        balance in 0i64..20_000,
        base_reserve in 0i64..1_000,
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let id = AccountId::from_u64(1);
        let mut store = BalanceStore::new(base_reserve);
        store.insert_account(AccountEntry::new(id, balance));

        let mut model_selling: i64 = 0;
        let mut model_buying: i64 = 0;

        for op in ops {
            let snapshot = store.liabilities(&id, &Asset::Native).unwrap();
            let mut ledger = LiabilityLedger::new(&mut store);
            match op {
                Op::Acquire(side, delta) => match ledger.acquire(&id, &Asset::Native, side, delta) {
                    Ok(_) => match side {
                        LiabilitySide::Selling => model_selling += delta,
                        LiabilitySide::Buying => model_buying += delta,
                    },
                    Err(LiabilityError::InsufficientBalance { .. }) => {
                        prop_assert_eq!(store.liabilities(&id, &Asset::Native).unwrap(), snapshot);
                    }
                    Err(e) => prop_assert!(false, "unexpected acquire error {e:?}"),
                },
                Op::Release(side, delta) => {
                    let recorded = snapshot.get(side);
                    match ledger.release(&id, &Asset::Native, side, delta) {
                        Ok(_) => {
                            prop_assert!(delta <= recorded);
                            match side {
                                LiabilitySide::Selling => model_selling -= delta,
                                LiabilitySide::Buying => model_buying -= delta,
                            }
                        }
                        Err(e) => {
                            prop_assert!(e.is_fatal());
                            prop_assert!(delta > recorded);
                            prop_assert_eq!(store.liabilities(&id, &Asset::Native).unwrap(), snapshot);
                        }
                    }
                }
            }

            let stored = store.liabilities(&id, &Asset::Native).unwrap();
            prop_assert_eq!(stored.selling(), model_selling);
            prop_assert_eq!(stored.buying(), model_buying);
            prop_assert!(stored.selling() >= 0 && stored.buying() >= 0);

            let line = store.balance_line(&id, &Asset::Native).unwrap();
            prop_assert!(line.available_to_sell() >= 0 || stored.selling() == 0);
        }
    }

    /// a rejected offer leaves every balance record bit-for-bit unchanged
    #[test]
    fn rejection_is_noop(
        balance in 0i64..10_000,
        amount in 1i64..50_000,
        p in small_price_strategy(),
        limit in 0i64..50_000,
    ) {
        let id = AccountId::from_u64(1);
        let mut store = BalanceStore::new(10);
        store.insert_account(AccountEntry::new(id, balance));
        store.insert_trust_line(TrustLineEntry::new(id, usd(), 0, limit));
        let before_accounts: Vec<AccountEntry> = store.accounts().cloned().collect();
        let before_lines: Vec<TrustLineEntry> = store.trust_lines().cloned().collect();

        let offer = Offer::new(id, OfferId(1), Asset::Native, usd(), amount, p, OfferFlags::NONE);
        let result = LiabilityLedger::new(&mut store).acquire_offer(&offer);

        if result.is_err() {
            prop_assert_eq!(store.accounts().cloned().collect::<Vec<_>>(), before_accounts);
            prop_assert_eq!(store.trust_lines().cloned().collect::<Vec<_>>(), before_lines);
        }
    }

    /// acquiring then releasing an offer restores the totals exactly
    #[test]
    fn acquire_release_round_trip(amount in 0i64..1_000_000, p in small_price_strategy()) {
        let id = AccountId::from_u64(1);
        let mut store = BalanceStore::new(0);
        store.insert_account(AccountEntry::new(id, 10_000_000));
        store.insert_trust_line(TrustLineEntry::new(id, usd(), 0, i64::MAX));

        let offer = Offer::new(id, OfferId(1), Asset::Native, usd(), amount, p, OfferFlags::NONE);
        let mut ledger = LiabilityLedger::new(&mut store);
        ledger.acquire_offer(&offer).unwrap();
        ledger.release_offer(&offer).unwrap();

        prop_assert!(store.liabilities(&id, &Asset::Native).unwrap().is_zero());
        prop_assert!(store.liabilities(&id, &usd()).unwrap().is_zero());
    }

    /// best_offers is sorted by price value, then id, whatever the insert order
    #[test]
    fn best_offers_sorted(
        ids in proptest::collection::btree_set(1u64..10_000, 1..40),
        prices in proptest::collection::vec(small_price_strategy(), 40),
    ) {
        let mut store = OfferStore::default();
        let mut delta = LedgerDelta::new(LedgerSeq(2));
        for (i, (id, price)) in ids.iter().zip(prices.iter()).enumerate() {
            let seller = AccountId::from_u64(i as u64 + 1);
            let offer = Offer::new(seller, OfferId(*id), Asset::Native, usd(), 10, *price, OfferFlags::NONE);
            store.add(offer, LedgerSeq(2), &mut delta).unwrap();
        }

        let best = store.best_offers(ids.len(), 0, &Asset::Native, &usd());
        prop_assert_eq!(best.len(), ids.len());
        for pair in best.windows(2) {
            let order = pair[0].price.compare(&pair[1].price);
            prop_assert!(order == Ordering::Less || (order == Ordering::Equal && pair[0].offer_id <= pair[1].offer_id));
        }
    }
}
