use crate::reports;
use clap::Args;
use flowopt::config::{OptimizeSettings, DEFAULT_FLOW_MODES, LARGE_SEARCH_SPACE};
use flowopt::evaluator::table::{TableContext, TableEvaluator};
use flowopt::model::Candidate;
use flowopt::optimizer::{
    ProgressCallback, ProgressSnapshot, ResultSlot, RunOptions, RunStatus, SearchCoordinator,
};
use flowopt::ranking::SortSpec;
use flowopt::OptResult;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub settings: OptimizeSettings,

    /// Probe only the first N default flow modes
    #[arg(long)]
    pub flow_modes: Option<usize>,

    /// Stop the search after this many seconds
    #[arg(short = 'T', long)]
    pub time: Option<u64>,

    /// Print results as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

struct CliLogger;
impl ProgressCallback for CliLogger {
    fn on_progress(&self, progress: &ProgressSnapshot) -> bool {
        info!("{}", reports::format_progress_line(progress));
        true
    }
}

#[derive(Serialize)]
struct Ranking<'a> {
    slot: ResultSlot,
    sort: String,
    results: &'a [Candidate],
}

#[derive(Serialize)]
struct SearchReport<'a> {
    progress: &'a ProgressSnapshot,
    rankings: Vec<Ranking<'a>>,
}

pub fn run(args: SearchArgs, settings: OptimizeSettings, ctx: Arc<TableContext>) -> OptResult<()> {
    let options = RunOptions::try_from(&settings)?;
    let flow_count = args
        .flow_modes
        .unwrap_or(DEFAULT_FLOW_MODES.len())
        .min(DEFAULT_FLOW_MODES.len());
    let flow_modes = &DEFAULT_FLOW_MODES[..flow_count];

    let keys = ctx.search_keys();
    match keys.search_space(flow_modes.len()) {
        Some(n) if n > LARGE_SEARCH_SPACE => {
            warn!("⚠️  {} candidates to evaluate; this may take a long time.", n)
        }
        None => warn!("⚠️  Search space overflows; this run will not finish on its own."),
        _ => {}
    }

    let coordinator = SearchCoordinator::new(Arc::new(TableEvaluator)).with_progress(CliLogger);
    coordinator.start(ctx, &keys, flow_modes, &options)?;

    if let Some(limit) = args.time.map(Duration::from_secs) {
        let started = Instant::now();
        while coordinator.status() == RunStatus::Running {
            if started.elapsed() >= limit {
                info!("⏱️  Time limit reached");
                coordinator.cancel();
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
    coordinator.wait();

    let progress = coordinator.progress();
    let results = coordinator.snapshots();
    let specs: [SortSpec; 3] = coordinator.sort_specs();

    if args.json {
        let report = SearchReport {
            progress: &progress,
            rankings: ResultSlot::iter()
                .map(|slot| Ranking {
                    slot,
                    sort: specs[slot.index()].to_string(),
                    results: &results[slot.index()],
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("\n=== 🏆 FINAL RESULT ===");
        for slot in ResultSlot::iter() {
            reports::print_result_table(slot, &specs[slot.index()], &results[slot.index()]);
        }
        reports::print_run_summary(&progress);
    }
    Ok(())
}
