use criterion::{criterion_group, criterion_main, Criterion};
use flowopt::evaluator::table::{Cell, Scenario, TableContext, TableEvaluator};
use flowopt::model::{AccountKey, AssetKey, Candidate, CandidateOrdinal, EvaluationResult};
use flowopt::optimizer::{Priority, RunOptions, SearchCoordinator};
use flowopt::ranking::{BoundedResultSet, SortSpec};
use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

fn random_candidates(n: u64, seed: u64) -> Vec<Candidate> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut out: Vec<Candidate> = (0..n)
        .map(|i| {
            Candidate::new(
                CandidateOrdinal::new(0, i / 720, i % 720),
                EvaluationResult {
                    net_tax_gains: rng.f64() * 1000.0 - 500.0,
                    abs_tax_gains: rng.f64() * 500.0,
                    sale_volume: rng.f64() * 10_000.0,
                    transaction_count: rng.u32(0..20),
                    wash_amount: rng.f64() * 10.0,
                    flow_mode: 0.5,
                    account_keys: vec![],
                    asset_keys: vec![],
                },
            )
        })
        .collect();
    rng.shuffle(&mut out);
    out
}

fn table_context(accounts: usize, assets: usize) -> TableContext {
    let mut rng = fastrand::Rng::with_seed(7);
    let scenario = Scenario {
        variable_accounts: (0..accounts).map(|i| AccountKey::new(format!("acct{}", i))).collect(),
        assets: (0..assets).map(|i| AssetKey::new(format!("asset{}", i))).collect(),
        ..Default::default()
    };
    let mut cells = HashMap::new();
    for asset in &scenario.assets {
        for acct in &scenario.variable_accounts {
            let gain = rng.f64() * 200.0 - 100.0;
            cells.insert(
                (asset.clone(), acct.clone()),
                Cell {
                    net_gain: gain,
                    abs_gain: gain.abs(),
                    sale_volume: rng.f64() * 1000.0,
                    wash: rng.f64(),
                    transactions: rng.u32(0..3),
                },
            );
        }
    }
    TableContext::new(scenario, cells)
}

fn criterion_benchmark(c: &mut Criterion) {
    let spec: SortSpec = "netTaxGains:asc,saleVolume:desc".parse().unwrap();
    let candidates = random_candidates(10_000, 42);

    c.bench_function("bounded push (10k, top 50)", |b| {
        b.iter(|| {
            let mut set = BoundedResultSet::new(50, spec.clone()).unwrap();
            for cand in &candidates {
                set.push(black_box(cand.clone()));
            }
            set.len()
        })
    });

    let ctx = Arc::new(table_context(3, 6));
    let keys = ctx.search_keys();
    let options = RunOptions {
        capacity: 10,
        workers: 4,
        priority: Priority::Adaptive,
        sort_specs: Default::default(),
        report_interval: Duration::from_millis(500),
    };
    let flows = [0.0, 0.5, 1.0];

    c.bench_function("search 3 flows x 3! x 6! (table)", |b| {
        b.iter(|| {
            let coordinator = SearchCoordinator::new(Arc::new(TableEvaluator));
            coordinator
                .start(Arc::clone(&ctx), &keys, black_box(&flows), &options)
                .unwrap();
            coordinator.wait();
            coordinator.progress().candidates_evaluated
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
