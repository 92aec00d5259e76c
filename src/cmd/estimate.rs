use crate::reports;
use clap::Args;
use flowopt::config::{DEFAULT_FLOW_MODES, LARGE_SEARCH_SPACE};
use flowopt::evaluator::table::TableContext;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    /// Probe only the first N default flow modes
    #[arg(long)]
    pub flow_modes: Option<usize>,

    /// Expected evaluations per second, for a time estimate
    #[arg(long)]
    pub rate: Option<f64>,
}

pub fn run(args: EstimateArgs, ctx: &TableContext) {
    let flow_count = args
        .flow_modes
        .unwrap_or(DEFAULT_FLOW_MODES.len())
        .min(DEFAULT_FLOW_MODES.len());
    let keys = ctx.search_keys();
    let space = keys.search_space(flow_count);

    info!(
        "🔎 {} variable accounts, {} assets, {} fixed accounts",
        keys.variable_accounts.len(),
        keys.assets.len(),
        keys.fixed_accounts.len()
    );
    reports::print_estimate(
        flow_count,
        keys.variable_accounts.len(),
        keys.assets.len(),
        space,
        args.rate,
    );

    if space.map_or(true, |n| n > LARGE_SEARCH_SPACE) {
        warn!(
            "⚠️  Search space exceeds {} candidates. Consider fewer flow modes or assets.",
            LARGE_SEARCH_SPACE
        );
    }
}
