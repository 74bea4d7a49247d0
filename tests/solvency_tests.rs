//! Solvency invariant tests.
//!
//! These tests drive the offer book through random mutation sequences and
//! verify that recorded liabilities always match the open offers and never
//! exceed what the balance records can back.

use offer_ledger::*;
use proptest::prelude::*;

const RESERVE: i64 = 100;

fn issuer() -> AccountId {
    AccountId::from_u64(500)
}

fn usd() -> Asset {
    Asset::credit("USD", issuer()).unwrap()
}

fn funded_book(traders: u64, native: i64, usd_balance: i64) -> OfferBook {
    let network = NetworkConfig {
        base_reserve: RESERVE,
        allow_full_scan: true,
        ..NetworkConfig::default()
    };
    let mut balances = BalanceStore::new(RESERVE);
    for i in 1..=traders {
        let id = AccountId::from_u64(i);
        balances.insert_account(AccountEntry::new(id, native));
        balances.insert_trust_line(TrustLineEntry::new(id, usd(), usd_balance, 1_000_000));
    }
    balances.insert_account(AccountEntry::new(issuer(), native));
    OfferBook::new(EngineConfig::new(network)).unwrap().with_balances(balances)
}

#[derive(Debug, Clone)]
enum Op {
    Create { trader: u64, sell_native: bool, amount: i64, n: i32, d: i32 },
    Update { pick: usize, amount: i64, n: i32, d: i32 },
    Delete { pick: usize },
}

fn op_strategy(traders: u64) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1..=traders, any::<bool>(), 1i64..5_000, 1i32..20, 1i32..20)
            .prop_map(|(trader, sell_native, amount, n, d)| Op::Create { trader, sell_native, amount, n, d }),
        2 => (any::<usize>(), 0i64..5_000, 1i32..20, 1i32..20)
            .prop_map(|(pick, amount, n, d)| Op::Update { pick, amount, n, d }),
        1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
    ]
}

/// Applies one op, tracking live offer keys.
fn apply(book: &mut OfferBook, live: &mut Vec<OfferKey>, op: &Op) -> Result<(), EngineError> {
    match *op {
        Op::Create { trader, sell_native, amount, n, d } => {
            let (selling, buying) = if sell_native {
                (Asset::Native, usd())
            } else {
                (usd(), Asset::Native)
            };
            let price = Price::new(n, d).unwrap();
            let outcome = book.create_offer(NewOffer::new(AccountId::from_u64(trader), selling, buying, amount, price))?;
            live.push(outcome.key);
        }
        Op::Update { pick, amount, n, d } => {
            if live.is_empty() {
                return Ok(());
            }
            let idx = pick % live.len();
            let key = live[idx];
            let outcome = book.update_offer(OfferUpdate {
                seller_id: key.seller_id,
                offer_id: key.offer_id,
                amount,
                price: Price::new(n, d).unwrap(),
                flags: OfferFlags::NONE,
            })?;
            if outcome.is_delete() {
                live.swap_remove(idx);
            }
        }
        Op::Delete { pick } => {
            if live.is_empty() {
                return Ok(());
            }
            let idx = pick % live.len();
            let key = live[idx];
            book.delete_offer(&key.seller_id, key.offer_id)?;
            live.swap_remove(idx);
        }
    }
    Ok(())
}

fn assert_backed(book: &OfferBook) {
    for account in book.balances().accounts() {
        let line = book.balances().balance_line(&account.account_id, &Asset::Native).unwrap();
        if line.liabilities.selling() > 0 {
            assert!(line.available_to_sell() >= 0, "native reserve breached for {:?}", account.account_id);
        }
    }
    for tl in book.balances().trust_lines() {
        let line = book.balances().balance_line(&tl.account_id, &tl.asset).unwrap();
        if line.liabilities.selling() > 0 {
            assert!(line.available_to_sell() >= 0);
        }
        if line.liabilities.buying() > 0 {
            assert!(line.available_to_buy() >= 0, "trust limit breached for {:?}", tl.account_id);
        }
    }
}

proptest! {
    /// Stored liabilities always equal the sum over open offers.
    #[test]
    fn liabilities_reconcile_after_every_mutation(
        native in 0i64..40_000,
        usd_balance in 0i64..40_000,
        ops in proptest::collection::vec(op_strategy(4), 1..50),
    ) {
        let mut book = funded_book(4, native, usd_balance);
        let mut live = Vec::new();
        book.begin_ledger(Timestamp::from_millis(1)).unwrap();

        for op in &ops {
            if let Err(e) = apply(&mut book, &mut live, op) {
                prop_assert!(!e.is_fatal(), "fatal error on {:?}: {}", op, e);
            }
            prop_assert!(book.reconcile_liabilities().is_ok());
            prop_assert_eq!(book.count_offers(None), live.len() as u64);
        }

        book.commit_ledger().unwrap();
        prop_assert!(book.reconcile_liabilities().is_ok());
    }

    /// No accepted mutation leaves a reserve or trust limit overcommitted.
    #[test]
    fn reservations_stay_backed(
        native in 0i64..20_000,
        usd_balance in 0i64..20_000,
        ops in proptest::collection::vec(op_strategy(3), 1..60),
    ) {
        let mut book = funded_book(3, native, usd_balance);
        let mut live = Vec::new();
        book.begin_ledger(Timestamp::from_millis(1)).unwrap();

        for op in &ops {
            let _ = apply(&mut book, &mut live, op);
            assert_backed(&book);
        }
    }

    /// Aborting a close restores balances, offers and ids exactly.
    #[test]
    fn abort_restores_committed_state(
        setup in proptest::collection::vec(op_strategy(3), 0..20),
        ops in proptest::collection::vec(op_strategy(3), 1..30),
    ) {
        let mut book = funded_book(3, 30_000, 30_000);
        let mut live = Vec::new();

        book.begin_ledger(Timestamp::from_millis(1)).unwrap();
        for op in &setup {
            let _ = apply(&mut book, &mut live, op);
        }
        book.commit_ledger().unwrap();

        let accounts: Vec<AccountEntry> = book.balances().accounts().cloned().collect();
        let lines: Vec<TrustLineEntry> = book.balances().trust_lines().cloned().collect();
        let asks = book.best_offers(1_000, 0, &Asset::Native, &usd());
        let bids = book.best_offers(1_000, 0, &usd(), &Asset::Native);
        let last_id = book.id_pool().last_generated();

        book.begin_ledger(Timestamp::from_millis(2)).unwrap();
        for op in &ops {
            let _ = apply(&mut book, &mut live, op);
        }
        book.abort_ledger().unwrap();

        prop_assert_eq!(book.balances().accounts().cloned().collect::<Vec<_>>(), accounts);
        prop_assert_eq!(book.balances().trust_lines().cloned().collect::<Vec<_>>(), lines);
        prop_assert_eq!(book.best_offers(1_000, 0, &Asset::Native, &usd()), asks);
        prop_assert_eq!(book.best_offers(1_000, 0, &usd(), &Asset::Native), bids);
        prop_assert_eq!(book.id_pool().last_generated(), last_id);
        prop_assert!(book.open_ledger().is_none());
    }

    /// Rejected creates leave no offer, no liability and no consumed id.
    #[test]
    fn rejected_create_is_invisible(native in 0i64..1_000, amount in 1i64..100_000) {
        let mut book = funded_book(1, native, 0);
        let seller = AccountId::from_u64(1);
        book.begin_ledger(Timestamp::from_millis(1)).unwrap();

        let result = book.create_offer(NewOffer::new(seller, Asset::Native, usd(), amount, Price::new(1, 1).unwrap()));
        if result.is_err() {
            prop_assert_eq!(book.count_offers(None), 0);
            prop_assert!(book.liabilities(&seller, &Asset::Native).unwrap().is_zero());
            prop_assert!(book.liabilities(&seller, &usd()).unwrap().is_zero());
            prop_assert_eq!(book.id_pool().last_generated(), 0);
            prop_assert!(book.pending_delta().unwrap().is_empty());
        } else {
            prop_assert!(amount <= native - 2 * RESERVE);
        }
    }

    /// The decimal view orders prices the same way exact comparison does.
    #[test]
    fn decimal_view_orders_like_compare(a in (1i32..50, 1i32..50), b in (1i32..50, 1i32..50)) {
        let pa = Price::new(a.0, a.1).unwrap();
        let pb = Price::new(b.0, b.1).unwrap();
        prop_assert_eq!(pa.compare(&pb), pa.as_decimal().cmp(&pb.as_decimal()));
    }
}

#[test]
fn issuer_offers_never_touch_reserves() {
    let mut book = funded_book(1, 1_000, 0);
    book.begin_ledger(Timestamp::from_millis(1)).unwrap();

    // issuer sells its own asset far beyond any balance
    book.create_offer(NewOffer::new(issuer(), usd(), Asset::Native, 10_000_000, Price::new(1, 10).unwrap()))
        .unwrap();

    let native = book.liabilities(&issuer(), &Asset::Native).unwrap();
    assert_eq!(native.buying(), 1_000_000);
    assert!(book.reconcile_liabilities().is_ok());
    assert_eq!(book.selling_capacity(&issuer(), &usd()), i64::MAX);
}
