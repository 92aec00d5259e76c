use super::permute::{search_space_size, PermutationSpace};
use super::progress::{ProgressCallback, ProgressSnapshot, RunClock, RunStatus};
use super::unit::{CancelToken, UnitCounters, UnitOutcome, UnitReport, WorkUnit};
use super::Priority;
use crate::config::{default_workers, OptimizeSettings, DEFAULT_CAPACITY, DEFAULT_REPORT_INTERVAL_MS};
use crate::error::{OptResult, OptimizeError};
use crate::evaluator::Evaluator;
use crate::model::{AccountKey, AssetKey, Candidate};
use crate::ranking::{BoundedResultSet, SortSpec};
use rayon::prelude::*;
use serde::Serialize;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumIter};
use tracing::{error, info, warn};

/// The three independently ranked result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum ResultSlot {
    A,
    B,
    C,
}

impl ResultSlot {
    pub fn index(self) -> usize {
        match self {
            ResultSlot::A => 0,
            ResultSlot::B => 1,
            ResultSlot::C => 2,
        }
    }
}

/// The keys whose orderings make up the search space.
#[derive(Debug, Clone, Default)]
pub struct SearchKeys {
    pub variable_accounts: Vec<AccountKey>,
    pub assets: Vec<AssetKey>,
    pub fixed_accounts: Vec<AccountKey>,
}

impl SearchKeys {
    pub fn search_space(&self, flow_modes: usize) -> Option<u128> {
        search_space_size(flow_modes, self.variable_accounts.len(), self.assets.len())
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub capacity: usize,
    pub workers: usize,
    pub priority: Priority,
    pub sort_specs: [SortSpec; 3],
    pub report_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            workers: default_workers(),
            priority: Priority::default(),
            sort_specs: Default::default(),
            report_interval: Duration::from_millis(DEFAULT_REPORT_INTERVAL_MS),
        }
    }
}

impl TryFrom<&OptimizeSettings> for RunOptions {
    type Error = OptimizeError;

    fn try_from(cfg: &OptimizeSettings) -> OptResult<Self> {
        Ok(Self {
            capacity: cfg.capacity,
            workers: cfg.worker_count(),
            priority: cfg.priority,
            sort_specs: cfg.sort_specs()?,
            report_interval: Duration::from_millis(cfg.report_interval_ms),
        })
    }
}

/// Mutable state of the current (or last) run. Only touched under the lock.
struct SearchRun {
    status: RunStatus,
    result_sets: [BoundedResultSet; 3],
    work_units_total: u64,
    work_units_completed: u64,
    totals: UnitCounters,
    discarded_calls: u64,
    search_space: Option<u128>,
    clock: RunClock,
    cancel: CancelToken,
    report_interval: Duration,
    last_report: Option<Instant>,
}

impl SearchRun {
    fn new() -> Self {
        Self {
            status: RunStatus::Idle,
            result_sets: Default::default(),
            work_units_total: 0,
            work_units_completed: 0,
            totals: UnitCounters::default(),
            discarded_calls: 0,
            search_space: None,
            clock: RunClock::default(),
            cancel: CancelToken::new(),
            report_interval: Duration::from_millis(DEFAULT_REPORT_INTERVAL_MS),
            last_report: None,
        }
    }

    fn reset_counters(&mut self) {
        self.work_units_completed = 0;
        self.totals = UnitCounters::default();
        self.discarded_calls = 0;
        self.last_report = None;
    }

    fn merge(&mut self, report: UnitReport) {
        for (global, local) in self.result_sets.iter_mut().zip(report.result_sets) {
            global.merge(local);
        }
        self.work_units_completed += 1;
        self.totals.candidates_evaluated += report.counters.candidates_evaluated;
        self.totals.recoverable_failures += report.counters.recoverable_failures;
        self.totals.unexpected_failures += report.counters.unexpected_failures;

        if self.work_units_completed == self.work_units_total {
            self.clock.stop();
            self.status = RunStatus::Idle;
            info!(
                "🏁 Search complete: {} candidates scored, {} over limit, {} failed in {:.2?}",
                self.totals.candidates_evaluated,
                self.totals.recoverable_failures,
                self.totals.unexpected_failures,
                self.clock.elapsed()
            );
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            work_units_total: self.work_units_total,
            work_units_completed: self.work_units_completed,
            candidates_evaluated: self.totals.candidates_evaluated,
            recoverable_failures: self.totals.recoverable_failures,
            unexpected_failures: self.totals.unexpected_failures,
            discarded_calls: self.discarded_calls,
            search_space: self.search_space,
            elapsed: self.clock.elapsed(),
        }
    }
}

/// State shared between the coordinator handle and its worker threads.
struct Shared {
    run: Mutex<SearchRun>,
    callback: Option<Arc<dyn ProgressCallback>>,
}

impl Shared {
    fn lock_run(&self) -> MutexGuard<'_, SearchRun> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The single merge path. Called by workers as units finish.
    fn on_unit_finished(&self, outcome: UnitOutcome) {
        let due = {
            let mut run = self.lock_run();
            match outcome {
                UnitOutcome::Completed(report) => run.merge(report),
                UnitOutcome::Cancelled(counters) => {
                    run.discarded_calls += counters.evaluator_calls();
                }
            }

            let finished = run.status == RunStatus::Idle;
            let interval_passed = run
                .last_report
                .map_or(true, |at| at.elapsed() >= run.report_interval);
            if self.callback.is_some() && (finished || interval_passed) {
                run.last_report = Some(Instant::now());
                Some(run.snapshot())
            } else {
                None
            }
        };

        if let Some(progress) = due {
            self.report(&progress);
        }
    }

    /// Called once the pool has drained, whether the run finished or was cancelled.
    ///
    /// `token` identifies the run the pool belonged to; a newer run is left alone.
    fn on_pool_drained(&self, token: &CancelToken) {
        let progress = {
            let mut run = self.lock_run();
            if !run.cancel.same_run(token) {
                warn!("Stale search driver drained after a newer run started");
                return;
            }
            run.clock.stop();
            if run.status == RunStatus::Idle {
                return;
            }
            if run.status == RunStatus::Running {
                warn!(
                    "Worker pool drained with {}/{} units merged",
                    run.work_units_completed, run.work_units_total
                );
            } else {
                info!(
                    "🛑 Search stopped after {}/{} units ({} partial evaluations discarded)",
                    run.work_units_completed, run.work_units_total, run.discarded_calls
                );
            }
            run.status = RunStatus::Idle;
            run.snapshot()
        };
        self.report(&progress);
    }

    fn report(&self, progress: &ProgressSnapshot) {
        if let Some(cb) = &self.callback {
            if !cb.on_progress(progress) && progress.status == RunStatus::Running {
                info!("Progress callback requested stop");
                self.cancel();
            }
        }
    }

    fn cancel(&self) -> bool {
        let mut run = self.lock_run();
        if run.status != RunStatus::Running {
            return false;
        }
        run.status = RunStatus::Cancelling;
        run.cancel.cancel();
        run.clock.stop();
        info!(
            "Cancelling search at {}/{} units",
            run.work_units_completed, run.work_units_total
        );
        true
    }
}

/// Runs the exhaustive flow-mode/ordering search on a bounded worker pool.
///
/// Every unit of work covers one (flow mode, account ordering) pair and walks
/// all asset orderings. Finished units are merged into three global top-N
/// sets on a single locked path; cancelled units contribute nothing.
pub struct SearchCoordinator<C, E> {
    evaluator: Arc<E>,
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
    _context: PhantomData<fn(&C)>,
}

impl<C, E> SearchCoordinator<C, E>
where
    C: Send + Sync + 'static,
    E: Evaluator<C> + 'static,
{
    pub fn new(evaluator: Arc<E>) -> Self {
        Self {
            evaluator,
            shared: Arc::new(Shared {
                run: Mutex::new(SearchRun::new()),
                callback: None,
            }),
            driver: Mutex::new(None),
            _context: PhantomData,
        }
    }

    /// Installs a progress callback. Must be called before the first `start`.
    pub fn with_progress<CB: ProgressCallback + 'static>(mut self, callback: CB) -> Self {
        self.shared = Arc::new(Shared {
            run: Mutex::new(SearchRun::new()),
            callback: Some(Arc::new(callback)),
        });
        self
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_driver(handle: JoinHandle<()>) {
        if handle.join().is_err() {
            error!("Search driver thread panicked");
        }
    }

    /// Validates the request and launches a run in the background.
    ///
    /// Refuses invalid input synchronously. If a cancelled run is still
    /// draining, waits for it before starting.
    pub fn start(
        &self,
        context: Arc<C>,
        keys: &SearchKeys,
        flow_modes: &[f64],
        options: &RunOptions,
    ) -> OptResult<()> {
        let mut driver = self.lock_driver();

        let status = self.shared.lock_run().status;
        if status == RunStatus::Running {
            warn!("Start ignored: a search is already running");
            return Err(OptimizeError::Busy(status));
        }
        if let Some(handle) = driver.take() {
            Self::join_driver(handle);
        }

        if let Err(e) = Self::validate(keys, flow_modes, options) {
            error!("Refusing to start search: {}", e);
            return Err(e);
        }

        let empty_sets = [
            BoundedResultSet::new(options.capacity, options.sort_specs[0].clone())?,
            BoundedResultSet::new(options.capacity, options.sort_specs[1].clone())?,
            BoundedResultSet::new(options.capacity, options.sort_specs[2].clone())?,
        ];

        let priority = options.priority;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("flowopt-worker-{}", i))
            .start_handler(move |_| priority.apply_to_current_thread())
            .build()?;

        let accounts = PermutationSpace::new(keys.variable_accounts.clone());
        let assets = PermutationSpace::new(keys.assets.clone());
        let mut fixed = keys.fixed_accounts.clone();
        fixed.sort();
        let fixed: Arc<[AccountKey]> = fixed.into();

        let units_total = accounts
            .count()
            .map_or(u64::MAX, |n| n.saturating_mul(flow_modes.len() as u64));
        let search_space = keys.search_space(flow_modes.len());
        let cancel = CancelToken::new();

        {
            let mut run = self.shared.lock_run();
            run.reset_counters();
            run.result_sets = empty_sets.clone();
            run.work_units_total = units_total;
            run.search_space = search_space;
            run.report_interval = options.report_interval;
            run.cancel = cancel.clone();
            run.clock.start();
            run.status = RunStatus::Running;
        }

        info!(
            "🚀 Searching {} units ({} candidates) on {} workers",
            units_total,
            search_space.map_or("overflow".to_string(), |n| n.to_string()),
            options.workers
        );

        let run_token = cancel.clone();
        let units = Self::work_units(flow_modes, accounts, assets, fixed, empty_sets, cancel.clone())
            .take_while(move |_| !cancel.is_cancelled());
        let evaluator = Arc::clone(&self.evaluator);
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("flowopt-driver".to_string())
            .spawn(move || {
                let drained = panic::catch_unwind(AssertUnwindSafe(|| {
                    pool.install(|| {
                        units.par_bridge().for_each(|unit| {
                            let outcome = unit.run(&*evaluator, &*context);
                            shared.on_unit_finished(outcome);
                        })
                    })
                }));
                if drained.is_err() {
                    error!("A work unit panicked; remaining results are incomplete");
                }
                shared.on_pool_drained(&run_token);
            });

        match spawned {
            Ok(handle) => {
                *driver = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut run = self.shared.lock_run();
                run.clock.stop();
                run.status = RunStatus::Idle;
                Err(e.into())
            }
        }
    }

    fn validate(keys: &SearchKeys, flow_modes: &[f64], options: &RunOptions) -> OptResult<()> {
        if options.workers == 0 {
            return Err(OptimizeError::ZeroWorkers);
        }
        if options.capacity == 0 {
            return Err(OptimizeError::ZeroCapacity);
        }
        if keys.variable_accounts.is_empty() {
            return Err(OptimizeError::NoVariableAccounts);
        }
        if keys.assets.is_empty() {
            return Err(OptimizeError::NoAssets);
        }
        if flow_modes.is_empty() {
            return Err(OptimizeError::NoFlowModes);
        }
        Ok(())
    }

    /// Lazily yields one unit per (flow mode, account ordering), in enumeration order.
    fn work_units(
        flow_modes: &[f64],
        accounts: PermutationSpace<AccountKey>,
        assets: PermutationSpace<AssetKey>,
        fixed: Arc<[AccountKey]>,
        empty_sets: [BoundedResultSet; 3],
        cancel: CancelToken,
    ) -> impl Iterator<Item = WorkUnit> + Send + 'static {
        flow_modes
            .to_vec()
            .into_iter()
            .enumerate()
            .flat_map(move |(flow_index, flow_mode)| {
                let assets = assets.clone();
                let fixed = Arc::clone(&fixed);
                let empty_sets = empty_sets.clone();
                let cancel = cancel.clone();
                accounts
                    .iter()
                    .enumerate()
                    .map(move |(account_index, ordering)| {
                        WorkUnit::new(
                            flow_index as u64,
                            flow_mode,
                            account_index as u64,
                            ordering,
                            assets.clone(),
                            Arc::clone(&fixed),
                            empty_sets.clone(),
                            cancel.clone(),
                        )
                    })
            })
    }

    /// Stops the run. In-flight units finish their current candidate and drop their work.
    ///
    /// Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Blocks until the current run's workers have all returned.
    ///
    /// Holds the driver slot while joining, so a concurrent `start` cannot
    /// begin until the old driver has exited.
    pub fn wait(&self) {
        let mut driver = self.lock_driver();
        if let Some(handle) = driver.take() {
            Self::join_driver(handle);
        }
    }

    /// Zeroes counters and empties the result sets, keeping their rankings.
    pub fn clear(&self) -> OptResult<()> {
        let mut run = self.shared.lock_run();
        if run.status != RunStatus::Idle {
            return Err(OptimizeError::Busy(run.status));
        }
        run.clock.reset();
        run.reset_counters();
        run.work_units_total = 0;
        run.search_space = None;
        for set in run.result_sets.iter_mut() {
            let spec = set.spec().clone();
            set.clear(spec);
        }
        Ok(())
    }

    pub fn status(&self) -> RunStatus {
        self.shared.lock_run().status
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.lock_run().snapshot()
    }

    /// Current contents of one result set, best first.
    pub fn results(&self, slot: ResultSlot) -> Vec<Candidate> {
        self.shared.lock_run().result_sets[slot.index()].snapshot()
    }

    pub fn snapshots(&self) -> [Vec<Candidate>; 3] {
        let run = self.shared.lock_run();
        [
            run.result_sets[0].snapshot(),
            run.result_sets[1].snapshot(),
            run.result_sets[2].snapshot(),
        ]
    }

    pub fn sort_specs(&self) -> [SortSpec; 3] {
        let run = self.shared.lock_run();
        [
            run.result_sets[0].spec().clone(),
            run.result_sets[1].spec().clone(),
            run.result_sets[2].spec().clone(),
        ]
    }
}

impl<C, E> Drop for SearchCoordinator<C, E> {
    fn drop(&mut self) {
        self.shared.cancel();
        let handle = self
            .driver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}
