//! A weekend away: shared groceries, a restaurant receipt in another
//! currency, closing spend and paying up.
//!
//! Run with `RUST_LOG=info cargo run --example weekend_trip`.

use rust_decimal_macros::dec;
use trip_settle::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let mut store = MemoryStore::new();
    let ledger = AssignmentLedger::default();
    let calc = SettlementCalculator::default();
    let (ines, joao, kim) = (MemberId::new("ines"), MemberId::new("joao"), MemberId::new("kim"));
    let everyone = [ines.clone(), joao.clone(), kim.clone()];

    let trip = Trip::new("weekend", "Weekend in Copenhagen", CurrencyCode::new("EUR"))
        .with_member(Member::new("ines", "Inês"))
        .with_member(Member::new("joao", "João"))
        .with_member(Member::new("kim", "Kim"));
    let trip_id = trip.id.clone();

    store.transaction(|tx| {
        tx.save_trip(&trip)?;
        let groceries = Expense::new(
            "groceries",
            trip_id.clone(),
            ines.clone(),
            dec!(64.90),
            CurrencyCode::new("EUR"),
            CurrencyCode::new("EUR"),
        )?
        .with_description("Groceries");
        tx.save_expense(&groceries)?;
        ledger.split_remainder_equally(tx, groceries.id(), &everyone, &ines)?;

        let dinner = Expense::new(
            "dinner",
            trip_id.clone(),
            joao.clone(),
            dec!(0),
            CurrencyCode::new("DKK"),
            CurrencyCode::new("EUR"),
        )?
        .with_fx_rate(dec!(0.134))?
        .with_description("Dinner at the harbour");
        tx.save_expense(&dinner)?;
        let receipt = dinner.id();
        ledger.add_item(tx, receipt, Item::new("fish", "Fish of the day", dec!(245)), &joao)?;
        ledger.add_item(tx, receipt, Item::new("pasta", "Pasta", dec!(185)), &joao)?;
        ledger.add_item(
            tx,
            receipt,
            Item::new("wine", "Wine by the glass", dec!(95)).with_quantity(4),
            &joao,
        )?;
        ledger.link_item_to_member(tx, receipt, &ItemId::new("fish"), &kim, &kim)?;
        ledger.link_item_to_member(tx, receipt, &ItemId::new("pasta"), &ines, &ines)?;
        ledger.claim_item(tx, receipt, &ItemId::new("wine"), &kim, 2, &kim)?;
        ledger.claim_item(tx, receipt, &ItemId::new("wine"), &joao, 2, &joao)?;
        Ok(())
    })?;

    let balances = compute_balances(&store.begin(), &trip_id)?;
    let transfers = calc.compute_settlement_plan(&balances)?;
    let report = trip_settle::settlement::SettlementReport {
        currency: CurrencyCode::new("EUR"),
        balances,
        transfers,
    };
    println!("{}", report);

    let closed = store.transaction(|tx| calc.close_spend(tx, &trip_id, &ines))?;
    for settlement in closed.settlements() {
        let paid = store.transaction(|tx| calc.record_payment(tx, settlement.id, settlement.amount, &settlement.from))?;
        println!("{} paid: {:?}", settlement.transfer(), paid.status);
    }

    println!("\n{} audit entries", store.audit_log().len());
    Ok(())
}
