use crate::error::{OptResult, OptimizeError};
use crate::optimizer::Priority;
use crate::ranking::SortSpec;
use clap::parser::ValueSource;
use clap::{ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 500;
pub const DEFAULT_SORT_A: &str = "netTaxGains:asc,saleVolume:asc";
pub const DEFAULT_SORT_B: &str = "absTaxGains:asc,transactionCount:asc";
pub const DEFAULT_SORT_C: &str = "saleVolume:asc,wash:asc";

/// Search spaces above this size deserve a warning before starting.
pub const LARGE_SEARCH_SPACE: u128 = 20_000_000;

/// Flow-mode probe values, coarse to fine (a 2^7 + 1 point bisection of [0, 1]).
pub const DEFAULT_FLOW_MODES: [f64; 129] = [
    0.000, 1.000, 0.500, 0.250, 0.750, 0.125, 0.375, 0.625, //
    0.875, 0.062, 0.188, 0.312, 0.438, 0.562, 0.688, 0.812, //
    0.938, 0.031, 0.094, 0.156, 0.219, 0.281, 0.344, 0.406, //
    0.469, 0.531, 0.594, 0.656, 0.719, 0.781, 0.844, 0.906, //
    0.969, 0.016, 0.047, 0.078, 0.109, 0.141, 0.172, 0.203, //
    0.234, 0.266, 0.297, 0.328, 0.359, 0.391, 0.422, 0.453, //
    0.484, 0.516, 0.547, 0.578, 0.609, 0.641, 0.672, 0.703, //
    0.734, 0.766, 0.797, 0.828, 0.859, 0.891, 0.922, 0.953, //
    0.984, 0.008, 0.023, 0.039, 0.055, 0.070, 0.086, 0.102, //
    0.117, 0.133, 0.148, 0.164, 0.180, 0.195, 0.211, 0.227, //
    0.242, 0.258, 0.273, 0.289, 0.305, 0.320, 0.336, 0.352, //
    0.367, 0.383, 0.398, 0.414, 0.430, 0.445, 0.461, 0.477, //
    0.492, 0.508, 0.523, 0.539, 0.555, 0.570, 0.586, 0.602, //
    0.617, 0.633, 0.648, 0.664, 0.680, 0.695, 0.711, 0.727, //
    0.742, 0.758, 0.773, 0.789, 0.805, 0.820, 0.836, 0.852, //
    0.867, 0.883, 0.898, 0.914, 0.930, 0.945, 0.961, 0.977, //
    0.992,
];

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeSettings {
    /// Results kept per ranking (top-N)
    #[arg(long = "top-n", default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Worker threads (defaults to available cores)
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum, default_value_t = Priority::Adaptive)]
    pub priority: Priority,

    #[arg(long, default_value = DEFAULT_SORT_A)]
    pub sort_a: String,
    #[arg(long, default_value = DEFAULT_SORT_B)]
    pub sort_b: String,
    #[arg(long, default_value = DEFAULT_SORT_C)]
    pub sort_c: String,

    #[arg(long, default_value_t = DEFAULT_REPORT_INTERVAL_MS)]
    pub report_interval_ms: u64,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            workers: None,
            priority: Priority::default(),
            sort_a: DEFAULT_SORT_A.to_string(),
            sort_b: DEFAULT_SORT_B.to_string(),
            sort_c: DEFAULT_SORT_C.to_string(),
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
        }
    }
}

impl OptimizeSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> OptResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            OptimizeError::Config(format!(
                "Failed to read settings file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overlays values the user typed on the command line; defaults don't override the file.
    pub fn merge_from_cli(&mut self, cli: &OptimizeSettings, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$field = cli.$field.clone();
                }
            };
        }

        update_if_present!(capacity, "capacity");
        update_if_present!(workers, "workers");
        update_if_present!(priority, "priority");
        update_if_present!(sort_a, "sort_a");
        update_if_present!(sort_b, "sort_b");
        update_if_present!(sort_c, "sort_c");
        update_if_present!(report_interval_ms, "report_interval_ms");
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }

    pub fn sort_specs(&self) -> OptResult<[SortSpec; 3]> {
        Ok([
            self.sort_a.parse()?,
            self.sort_b.parse()?,
            self.sort_c.parse()?,
        ])
    }
}
