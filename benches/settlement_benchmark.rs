use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use trip_settle::core::currency::CurrencyCode;
use trip_settle::settlement::{compute_balances, SettlementCalculator};
use trip_settle::simulation::trip_generator::{generate_trip, TripConfig};
use trip_settle::store::MemoryStore;

fn seeded_store(member_count: usize, expense_count: usize) -> (MemoryStore, trip_settle::core::trip::TripId) {
    let config = TripConfig {
        member_count,
        expense_count,
        currencies: vec![CurrencyCode::new("USD"), CurrencyCode::new("GBP")],
        ..Default::default()
    };
    let snapshot = generate_trip(&config, &mut StdRng::seed_from_u64(2024)).unwrap();
    let trip_id = snapshot.trip.id.clone();
    (MemoryStore::from_snapshot(snapshot).unwrap(), trip_id)
}

fn bench_balances_small_trip(c: &mut Criterion) {
    let (store, trip) = seeded_store(6, 40);
    let tx = store.begin();
    c.bench_function("balances_6_members_40_expenses", |b| {
        b.iter(|| compute_balances(black_box(&tx), black_box(&trip)).unwrap())
    });
}

fn bench_plan_large_group(c: &mut Criterion) {
    let (store, trip) = seeded_store(200, 2_000);
    let balances = compute_balances(&store.begin(), &trip).unwrap();
    let calc = SettlementCalculator::default();
    c.bench_function("plan_200_members", |b| {
        b.iter(|| calc.compute_settlement_plan(black_box(&balances)).unwrap())
    });
}

fn bench_close_spend(c: &mut Criterion) {
    let (store, trip) = seeded_store(30, 300);
    let calc = SettlementCalculator::default();
    let actor = trip_settle::core::member::MemberId::new("member-00");
    c.bench_function("close_spend_30_members", |b| {
        b.iter(|| {
            let mut tx = store.begin();
            calc.close_spend(&mut tx, black_box(&trip), &actor).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_balances_small_trip,
    bench_plan_large_group,
    bench_close_spend
);
criterion_main!(benches);
