use crate::reports;
use clap::Args;
use flowopt::evaluator::table::{TableContext, TableEvaluator};
use flowopt::evaluator::Evaluator;
use flowopt::model::{AccountKey, AssetKey, SearchParameters};
use flowopt::OptResult;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Variable account order, comma separated (defaults to scenario order)
    #[arg(long, value_delimiter = ',')]
    pub accounts: Vec<String>,

    /// Asset order, comma separated (defaults to scenario order)
    #[arg(long, value_delimiter = ',')]
    pub assets: Vec<String>,

    #[arg(short, long, default_value_t = 0.5)]
    pub flow_mode: f64,

    /// Ignore per-account limits
    #[arg(long, default_value_t = false)]
    pub lenient: bool,
}

pub fn run(args: EvaluateArgs, ctx: &TableContext) -> OptResult<()> {
    let keys = ctx.search_keys();
    let accounts = if args.accounts.is_empty() {
        keys.variable_accounts
    } else {
        args.accounts.iter().map(AccountKey::new).collect()
    };
    let assets = if args.assets.is_empty() {
        keys.assets
    } else {
        args.assets.iter().map(AssetKey::new).collect()
    };

    let params = SearchParameters {
        variable_account_keys: accounts,
        asset_keys: assets,
        flow_mode: args.flow_mode,
        is_strict: !args.lenient,
        fixed_account_keys: Arc::from(keys.fixed_accounts),
    };

    let result = TableEvaluator.evaluate(ctx, &params)?;
    reports::print_evaluation(&result);
    Ok(())
}
