//! Offer book simulation.
//!
//! Walks the offer lifecycle end to end: placement, liability reservation,
//! rejection, best-offer selection, repricing, aborted closes and audits.

use offer_ledger::*;
use std::error::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type SimResult = Result<(), Box<dyn Error>>;

const BASE_RESERVE: i64 = 5_000_000;

fn main() -> SimResult {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,offer_ledger=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();

    println!("Offer Book Simulation");
    println!("Native + USD, reserve-backed liabilities\n");

    scenario_1_place_offer()?;
    scenario_2_reserve_rejection()?;
    scenario_3_price_time_priority()?;
    scenario_4_reprice_and_cancel()?;
    scenario_5_aborted_close()?;
    scenario_6_audit()?;
    scenario_7_stress_test()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn issuer() -> AccountId {
    AccountId::from_u64(1_000)
}

fn usd() -> Result<Asset, Box<dyn Error>> {
    Asset::credit("USD", issuer()).ok_or_else(|| "invalid asset code".into())
}

fn px(n: i32, d: i32) -> Result<Price, Box<dyn Error>> {
    Price::new(n, d).ok_or_else(|| "invalid price".into())
}

/// Book with `traders` accounts, each holding `native` stroops and a USD line.
fn funded_book(network: NetworkConfig, traders: u64, native: i64) -> Result<OfferBook, Box<dyn Error>> {
    let mut balances = BalanceStore::new(network.base_reserve);
    for i in 1..=traders {
        let id = AccountId::from_u64(i);
        balances.insert_account(AccountEntry::new(id, native));
        balances.insert_trust_line(TrustLineEntry::new(id, usd()?, 0, i64::MAX / 2));
    }
    balances.insert_account(AccountEntry::new(issuer(), native));
    Ok(OfferBook::new(EngineConfig::new(network))?.with_balances(balances))
}

/// Placing one offer reserves both sides.
fn scenario_1_place_offer() -> SimResult {
    println!("Scenario 1: Offer Placement\n");

    let mut book = funded_book(NetworkConfig::default(), 1, 20_000_000)?;
    let alice = AccountId::from_u64(1);
    book.begin_ledger(Timestamp::now())?;

    let outcome = book.create_offer(NewOffer::new(alice, Asset::Native, usd()?, 100, px(1, 3)?))?;
    println!("  Alice sells 100 native @ 1/3 USD, offer {}", outcome.key.offer_id);

    let native = book.liabilities(&alice, &Asset::Native).unwrap_or_default();
    let usd_line = book.liabilities(&alice, &usd()?).unwrap_or_default();
    println!("  Native liabilities: {}", native);
    println!("  USD liabilities:    {} (100/3 rounded up)", usd_line);
    println!("  Sellable native left: {}", book.selling_capacity(&alice, &Asset::Native));

    let summary = book.commit_ledger()?;
    println!(
        "  Ledger {} closed: {} created, {} updated\n",
        summary.ledger_seq, summary.created, summary.updated
    );
    Ok(())
}

/// Offers beyond spendable balance are refused and change nothing.
fn scenario_2_reserve_rejection() -> SimResult {
    println!("Scenario 2: Reserve Enforcement\n");

    let mut book = funded_book(NetworkConfig::default(), 1, 20_000_000)?;
    let alice = AccountId::from_u64(1);
    book.begin_ledger(Timestamp::now())?;

    let min = book.minimum_balance(&alice).unwrap_or(0);
    println!("  Balance 20,000,000, minimum reserve {}", min);

    book.create_offer(NewOffer::new(alice, Asset::Native, usd()?, 9_000_000, px(1, 1)?))?;
    println!("  Offer of 9,000,000 accepted");

    match book.create_offer(NewOffer::new(alice, Asset::Native, usd()?, 2_000_000, px(1, 1)?)) {
        Ok(_) => println!("  Second offer unexpectedly accepted"),
        Err(e) => println!("  Second offer of 2,000,000 rejected: {:?}", e.kind()),
    }

    let native = book.liabilities(&alice, &Asset::Native).unwrap_or_default();
    println!("  Selling liabilities still {}\n", native.selling());
    book.commit_ledger()?;
    Ok(())
}

/// Equal prices break ties by offer id. Passive takers skip equal prices.
fn scenario_3_price_time_priority() -> SimResult {
    println!("Scenario 3: Price-Time Priority\n");

    let mut book = funded_book(NetworkConfig::default(), 3, 100_000_000)?;
    book.begin_ledger(Timestamp::now())?;

    let quotes = [(1, 10, px(3, 2)?), (2, 5, px(3, 2)?), (3, 7, px(1, 1)?)];
    for (seller, id, price) in quotes {
        let request = NewOffer::new(AccountId::from_u64(seller), Asset::Native, usd()?, 1_000, price)
            .with_id(OfferId(id));
        book.create_offer(request)?;
    }
    book.commit_ledger()?;

    let best = book.best_offers(10, 0, &Asset::Native, &usd()?);
    let order: Vec<String> = best
        .iter()
        .map(|o| format!("id {} @ {}", o.offer_id, o.price))
        .collect();
    println!("  Book order: {}", order.join(", "));

    for level in book.price_levels(&Asset::Native, &usd()?, 5) {
        println!(
            "  Level {} (~{:.4}): {} units across {} offers",
            level.price,
            level.price.effective_price(),
            level.total_amount,
            level.offer_count
        );
    }

    // a taker paying USD at exactly 1 native per USD
    let taker = Offer::new(issuer(), OfferId(0), usd()?, Asset::Native, 500, px(1, 1)?, OfferFlags::NONE);
    let passive = Offer {
        flags: OfferFlags::PASSIVE,
        ..taker.clone()
    };
    println!("  Active taker can cross {} offers", book.crossing_offers(&taker, 10).len());
    println!("  Passive taker can cross {} offers\n", book.crossing_offers(&passive, 10).len());
    Ok(())
}

/// Updates move liabilities by the net difference; a zero amount deletes.
fn scenario_4_reprice_and_cancel() -> SimResult {
    println!("Scenario 4: Reprice and Cancel\n");

    let mut book = funded_book(NetworkConfig::default(), 1, 50_000_000)?;
    let alice = AccountId::from_u64(1);
    book.begin_ledger(Timestamp::now())?;

    let created = book.create_offer(NewOffer::new(alice, Asset::Native, usd()?, 1_000, px(1, 1)?))?;
    let id = created.key.offer_id;

    book.update_offer(OfferUpdate {
        seller_id: alice,
        offer_id: id,
        amount: 600,
        price: px(5, 4)?,
        flags: OfferFlags::NONE,
    })?;
    let usd_line = book.liabilities(&alice, &usd()?).unwrap_or_default();
    println!("  Repriced to 600 @ 5/4, USD buying liabilities {}", usd_line.buying());

    let outcome = book.update_offer(OfferUpdate {
        seller_id: alice,
        offer_id: id,
        amount: 0,
        price: px(5, 4)?,
        flags: OfferFlags::NONE,
    })?;
    println!("  Amount set to 0, deleted: {}", outcome.is_delete());

    let native = book.liabilities(&alice, &Asset::Native).unwrap_or_default();
    println!("  Liabilities back to zero: {}", native.is_zero());

    let summary = book.commit_ledger()?;
    println!("  Ledger {} recorded {} changes\n", summary.ledger_seq, summary.changes.len());
    Ok(())
}

/// Aborting a close reverts offers, liabilities and ids.
fn scenario_5_aborted_close() -> SimResult {
    println!("Scenario 5: Aborted Ledger Close\n");

    let mut book = funded_book(NetworkConfig::default(), 2, 50_000_000)?;
    book.begin_ledger(Timestamp::now())?;
    for seller in 1..=2 {
        book.create_offer(NewOffer::new(AccountId::from_u64(seller), Asset::Native, usd()?, 1_000, px(2, 1)?))?;
    }
    println!("  Placed {} offers, next id would be {}", book.count_offers(None), book.id_pool().last_generated() + 1);

    let reverted = book.abort_ledger()?;
    println!("  Aborted close, {} entries restored", reverted);
    println!("  Offers on book: {}", book.count_offers(None));
    println!("  Id pool rewound to {}\n", book.id_pool().last_generated());
    Ok(())
}

/// Full reconciliation of stored liabilities against the offers.
fn scenario_6_audit() -> SimResult {
    println!("Scenario 6: Liability Audit\n");

    let mut book = funded_book(NetworkConfig::development(), 5, 50_000_000)?;
    book.begin_ledger(Timestamp::now())?;
    for seller in 1..=5u64 {
        let amount = 1_000 * seller as i64;
        book.create_offer(NewOffer::new(AccountId::from_u64(seller), Asset::Native, usd()?, amount, px(7, 3)?))?;
    }
    // development config audits before committing
    book.commit_ledger()?;

    let report = book.reconcile_liabilities()?;
    println!(
        "  Audit passed: {} offers, {} balance records\n",
        report.offers_scanned, report.lines_checked
    );
    Ok(())
}

/// Many offers across many accounts in a handful of closes.
fn scenario_7_stress_test() -> SimResult {
    println!("Scenario 7: Stress Test\n");

    let num_traders = 50u64;
    let book = SharedOfferBook::new(funded_book(
        NetworkConfig {
            base_reserve: BASE_RESERVE,
            ..NetworkConfig::testnet()
        },
        num_traders,
        1_000_000_000,
    )?);

    let usd = usd()?;
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for round in 0..5i32 {
        let mut requests = Vec::new();
        for trader in 1..=num_traders {
            let n = 90 + ((trader as i32 * 7 + round) % 21);
            let amount = 1_000_000 * (1 + (trader as i64 % 40));
            requests.push(NewOffer::new(AccountId::from_u64(trader), Asset::Native, usd.clone(), amount, px(n, 100)?));
        }

        let summary = book.close_ledger(Timestamp::now(), |b| {
            for request in requests {
                match b.create_offer(request) {
                    Ok(_) => accepted += 1,
                    Err(e) if !e.is_fatal() => rejected += 1,
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })?;
        println!("  Ledger {}: {} created", summary.ledger_seq, summary.created);
    }

    let guard = book.read();
    let levels = guard.price_levels(&Asset::Native, &usd, 3);
    println!("  Accepted {}, rejected {}", accepted, rejected);
    println!("  Offers on book: {}", guard.count_offers(None));
    if let Some(best) = levels.first() {
        println!("  Best level {} with {} offers", best.price, best.offer_count);
    }
    println!("  Audit: {:?}", guard.reconcile_liabilities().map(|r| r.offers_scanned));
    println!("  Events generated: {}\n", guard.events().len());
    Ok(())
}
