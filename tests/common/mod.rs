#![allow(dead_code)]

use flowopt::evaluator::{EvalError, Evaluator};
use flowopt::model::{Candidate, CandidateOrdinal, EvaluationResult, SearchParameters};
use flowopt::optimizer::{PermutationSpace, Priority, RunOptions, SearchKeys};
use flowopt::ranking::SortSpec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub fn keys(accounts: &[&str], assets: &[&str]) -> SearchKeys {
    SearchKeys {
        variable_accounts: accounts.iter().map(|&a| a.into()).collect(),
        assets: assets.iter().map(|&a| a.into()).collect(),
        fixed_accounts: Vec::new(),
    }
}

pub fn options(capacity: usize, workers: usize, specs: [&str; 3]) -> RunOptions {
    RunOptions {
        capacity,
        workers,
        priority: Priority::Adaptive,
        sort_specs: specs.map(|s| s.parse::<SortSpec>().unwrap()),
        report_interval: Duration::ZERO,
    }
}

fn code(key: &str) -> f64 {
    (key.as_bytes()[0] - b'a' + 1) as f64
}

/// Deterministic scores driven by key positions, with plenty of ties on
/// the integer-valued attributes.
pub fn positional(_: &(), p: &SearchParameters) -> Result<EvaluationResult, EvalError> {
    let net: f64 = p
        .asset_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (i + 1) as f64 * code(k.as_str()))
        .sum();
    let acct: f64 = p
        .variable_account_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (i + 1) as f64 * code(k.as_str()))
        .sum();

    Ok(EvaluationResult {
        net_tax_gains: net * (1.0 + p.flow_mode) - acct,
        abs_tax_gains: net,
        sale_volume: code(p.asset_keys[0].as_str()) + p.flow_mode,
        transaction_count: code(p.asset_keys[0].as_str()) as u32,
        wash_amount: code(p.variable_account_keys[0].as_str()),
        flow_mode: p.flow_mode,
        account_keys: p.variable_account_keys.clone(),
        asset_keys: p.asset_keys.clone(),
    })
}

/// Every candidate in enumeration order, scored with `positional`.
pub fn enumerate_all(flow_modes: &[f64], keys: &SearchKeys) -> Vec<Candidate> {
    let accounts = PermutationSpace::new(keys.variable_accounts.clone());
    let assets = PermutationSpace::new(keys.assets.clone());
    let mut all = Vec::new();
    for (f, &flow_mode) in flow_modes.iter().enumerate() {
        for (a, account_keys) in accounts.iter().enumerate() {
            for (s, asset_keys) in assets.iter().enumerate() {
                let params = SearchParameters {
                    variable_account_keys: account_keys.clone(),
                    asset_keys,
                    flow_mode,
                    is_strict: true,
                    fixed_account_keys: Arc::from(Vec::new()),
                };
                if let Ok(result) = positional(&(), &params) {
                    let ordinal = CandidateOrdinal::new(f as u64, a as u64, s as u64);
                    all.push(Candidate::new(ordinal, result));
                }
            }
        }
    }
    all
}

pub fn brute_force_top(spec: &SortSpec, mut all: Vec<Candidate>, capacity: usize) -> Vec<Candidate> {
    all.sort_by(|a, b| spec.compare_candidates(a, b));
    all.truncate(capacity);
    all
}

pub fn ordinals(candidates: &[Candidate]) -> Vec<CandidateOrdinal> {
    candidates.iter().map(|c| c.ordinal).collect()
}

/// Blocks every evaluation until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
    pub entered: AtomicUsize,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn pass(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut open = self.open.lock().unwrap();
        while !*open && Instant::now() < deadline {
            open = self
                .cv
                .wait_timeout(open, Duration::from_millis(50))
                .unwrap()
                .0;
        }
    }

    pub fn wait_for_entry(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.entered.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "no evaluation started");
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

pub struct GatedEvaluator(pub Arc<Gate>);

impl Evaluator<()> for GatedEvaluator {
    fn evaluate(&self, ctx: &(), params: &SearchParameters) -> Result<EvaluationResult, EvalError> {
        self.0.pass();
        positional(ctx, params)
    }
}
