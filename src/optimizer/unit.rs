use super::permute::PermutationSpace;
use crate::evaluator::Evaluator;
use crate::model::{AccountKey, AssetKey, Candidate, CandidateOrdinal, SearchParameters};
use crate::ranking::BoundedResultSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// Shared flag polled by work units between candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// True when both tokens were cloned from the same run.
    pub fn same_run(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Per-unit tallies. Every evaluator call lands in exactly one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitCounters {
    pub candidates_evaluated: u64,
    pub recoverable_failures: u64,
    pub unexpected_failures: u64,
}

impl UnitCounters {
    pub fn evaluator_calls(&self) -> u64 {
        self.candidates_evaluated + self.recoverable_failures + self.unexpected_failures
    }
}

/// What a fully iterated unit hands back for merging.
#[derive(Debug)]
pub struct UnitReport {
    pub flow_mode: f64,
    pub account_permutation: Vec<AccountKey>,
    pub result_sets: [BoundedResultSet; 3],
    pub counters: UnitCounters,
}

#[derive(Debug)]
pub enum UnitOutcome {
    Completed(UnitReport),
    /// The unit saw the cancel flag. Its partial results are dropped.
    Cancelled(UnitCounters),
}

/// Every candidate sharing one (flow mode, account ordering) pair.
pub struct WorkUnit {
    flow_index: u64,
    flow_mode: f64,
    account_index: u64,
    account_permutation: Vec<AccountKey>,
    assets: PermutationSpace<AssetKey>,
    fixed_account_keys: Arc<[AccountKey]>,
    local: [BoundedResultSet; 3],
    cancel: CancelToken,
}

impl WorkUnit {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flow_index: u64,
        flow_mode: f64,
        account_index: u64,
        account_permutation: Vec<AccountKey>,
        assets: PermutationSpace<AssetKey>,
        fixed_account_keys: Arc<[AccountKey]>,
        empty_sets: [BoundedResultSet; 3],
        cancel: CancelToken,
    ) -> Self {
        Self {
            flow_index,
            flow_mode,
            account_index,
            account_permutation,
            assets,
            fixed_account_keys,
            local: empty_sets,
            cancel,
        }
    }

    pub fn flow_mode(&self) -> f64 {
        self.flow_mode
    }

    pub fn account_permutation(&self) -> &[AccountKey] {
        &self.account_permutation
    }

    /// Evaluates every asset ordering, unless cancelled along the way.
    pub fn run<C, E>(mut self, evaluator: &E, context: &C) -> UnitOutcome
    where
        C: ?Sized,
        E: Evaluator<C> + ?Sized,
    {
        let mut counters = UnitCounters::default();
        if self.cancel.is_cancelled() {
            return UnitOutcome::Cancelled(counters);
        }

        for (asset_index, asset_keys) in self.assets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return UnitOutcome::Cancelled(counters);
            }

            let params = SearchParameters {
                variable_account_keys: self.account_permutation.clone(),
                asset_keys,
                flow_mode: self.flow_mode,
                is_strict: true,
                fixed_account_keys: Arc::clone(&self.fixed_account_keys),
            };

            match evaluator.evaluate(context, &params) {
                Ok(result) => {
                    counters.candidates_evaluated += 1;
                    let ordinal =
                        CandidateOrdinal::new(self.flow_index, self.account_index, asset_index as u64);
                    let candidate = Candidate::new(ordinal, result);
                    for set in self.local.iter_mut() {
                        set.push(candidate.clone());
                    }
                }
                Err(e) if e.is_recoverable() => {
                    counters.recoverable_failures += 1;
                }
                Err(e) => {
                    counters.unexpected_failures += 1;
                    error!("Unexpected evaluation failure: {} | params: {:?}", e, params);
                }
            }
        }

        UnitOutcome::Completed(UnitReport {
            flow_mode: self.flow_mode,
            account_permutation: self.account_permutation,
            result_sets: self.local,
            counters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvalError;
    use crate::model::EvaluationResult;
    use crate::ranking::{Attribute, SortKey, SortSpec};

    fn sets() -> [BoundedResultSet; 3] {
        let spec = SortSpec::new(vec![SortKey::asc(Attribute::NetTaxGains)]);
        let set = BoundedResultSet::new(2, spec).unwrap();
        [set.clone(), set.clone(), set]
    }

    fn unit(cancel: CancelToken) -> WorkUnit {
        WorkUnit::new(
            0,
            0.5,
            0,
            vec!["ira".into()],
            PermutationSpace::new(vec![AssetKey::from("a"), "b".into(), "c".into()]),
            Arc::from(Vec::new()),
            sets(),
            cancel,
        )
    }

    fn by_position(_: &(), p: &SearchParameters) -> Result<EvaluationResult, EvalError> {
        if p.asset_keys[0].as_str() == "c" {
            return Err(EvalError::LimitExceededUnderStrict);
        }
        if p.asset_keys[1].as_str() == "c" {
            return Err(EvalError::Other("boom".to_string()));
        }
        Ok(EvaluationResult {
            net_tax_gains: if p.asset_keys[0].as_str() == "a" { 1.0 } else { 2.0 },
            abs_tax_gains: 0.0,
            sale_volume: 0.0,
            transaction_count: 0,
            wash_amount: 0.0,
            flow_mode: p.flow_mode,
            account_keys: p.variable_account_keys.clone(),
            asset_keys: p.asset_keys.clone(),
        })
    }

    #[test]
    fn test_counts_every_call_once() {
        let UnitOutcome::Completed(report) = unit(CancelToken::new()).run(&by_position, &()) else {
            panic!("unit should complete");
        };
        // abc ok, acb boom, bac ok, bca boom, cab/cba limit
        assert_eq!(report.counters.candidates_evaluated, 2);
        assert_eq!(report.counters.unexpected_failures, 2);
        assert_eq!(report.counters.recoverable_failures, 2);
        assert_eq!(report.counters.evaluator_calls(), 6);
        assert_eq!(report.result_sets[0].len(), 2);
    }

    #[test]
    fn test_cancelled_before_start_does_nothing() {
        let token = CancelToken::new();
        token.cancel();
        match unit(token).run(&by_position, &()) {
            UnitOutcome::Cancelled(c) => assert_eq!(c.evaluator_calls(), 0),
            UnitOutcome::Completed(_) => panic!("unit ignored cancellation"),
        }
    }

    #[test]
    fn test_token_identifies_its_run() {
        let first = CancelToken::new();
        let clone = first.clone();
        assert!(first.same_run(&clone));
        assert!(!first.same_run(&CancelToken::new()));
    }
}
