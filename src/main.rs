use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use flowopt::config::OptimizeSettings;
use flowopt::evaluator::table::TableContext;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, short, long, default_value = "data/scenario.json")]
    scenario: String,

    #[arg(global = true, short, long, default_value = "data/cells.csv")]
    table: String,

    /// JSON settings file; flags given on the command line take precedence
    #[arg(global = true, long)]
    settings: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the exhaustive search and print the three rankings
    Search(cmd::search::SearchArgs),
    /// Report the size of the search space without running it
    Estimate(cmd::estimate::EstimateArgs),
    /// Score a single account/asset ordering
    Evaluate(cmd::evaluate::EvaluateArgs),
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("📂 Loading Scenario: {}", cli.scenario);
    info!("📂 Loading Cell Table: {}", cli.table);
    let ctx = TableContext::load(&cli.scenario, &cli.table).unwrap_or_else(|e| {
        error!("❌ FATAL ERROR LOADING DATA:");
        error!("   {}", e);
        process::exit(1);
    });

    let missing = ctx.missing_cells();
    if !missing.is_empty() {
        warn!(
            "⚠️  Cell table lacks {} asset/account pairs (first: {} in {})",
            missing.len(),
            missing[0].0,
            missing[0].1
        );
    }
    let ctx = Arc::new(ctx);

    match cli.command {
        Commands::Search(args) => {
            let mut settings = match &cli.settings {
                Some(path) => {
                    info!("⚙️  Loading Settings from: {}", path);
                    OptimizeSettings::load_from_file(path).unwrap_or_else(|e| {
                        error!("{}", e);
                        process::exit(1);
                    })
                }
                None => args.settings.clone(),
            };
            if cli.settings.is_some() {
                if let Some(sub_matches) = matches.subcommand_matches("search") {
                    settings.merge_from_cli(&args.settings, sub_matches);
                }
            }

            if let Err(e) = cmd::search::run(args, settings, ctx) {
                error!("❌ Search failed: {}", e);
                process::exit(1);
            }
        }
        Commands::Estimate(args) => cmd::estimate::run(args, &ctx),
        Commands::Evaluate(args) => {
            if let Err(e) = cmd::evaluate::run(args, &ctx) {
                error!("❌ {}", e);
                process::exit(1);
            }
        }
    }
}
