//! Table-driven evaluator used by the command line, the benches and tests.
//!
//! A scenario file names the accounts and assets; a CSV cell table gives,
//! for each (asset, account) pair, the figures a full sale of that holding
//! would produce. A candidate is scored by walking its asset ordering: the
//! asset at position `i` is placed in variable account `i % accounts` and
//! traded with a weight that blends a flat trade (`flow_mode = 1`) with a
//! rank-decaying one (`flow_mode = 0`).

use crate::error::{OptResult, OptimizeError};
use crate::evaluator::{EvalError, Evaluator};
use crate::model::{AccountKey, AssetKey, EvaluationResult, SearchParameters};
use crate::optimizer::SearchKeys;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub variable_accounts: Vec<AccountKey>,
    pub fixed_accounts: Vec<AccountKey>,
    pub assets: Vec<AssetKey>,
    /// Maximum sale volume per account when evaluating strictly.
    pub account_limits: BTreeMap<AccountKey, f64>,
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> OptResult<Self> {
        let content = fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> OptResult<()> {
        let mut seen = HashSet::new();
        for acct in self.variable_accounts.iter().chain(&self.fixed_accounts) {
            if !seen.insert(acct.as_str()) {
                return Err(OptimizeError::Validation(format!(
                    "Account '{}' listed more than once",
                    acct
                )));
            }
        }
        let mut seen = HashSet::new();
        for asset in &self.assets {
            if !seen.insert(asset.as_str()) {
                return Err(OptimizeError::Validation(format!(
                    "Asset '{}' listed more than once",
                    asset
                )));
            }
        }
        Ok(())
    }

    /// Fixed accounts in the canonical (sorted) order handed to every candidate.
    pub fn sorted_fixed_accounts(&self) -> Vec<AccountKey> {
        let mut keys = self.fixed_accounts.clone();
        keys.sort();
        keys
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cell {
    pub net_gain: f64,
    pub abs_gain: f64,
    pub sale_volume: f64,
    pub wash: f64,
    pub transactions: u32,
}

/// Read-only snapshot shared by every work unit of a run.
#[derive(Debug, Clone, Default)]
pub struct TableContext {
    pub scenario: Scenario,
    cells: HashMap<(AssetKey, AccountKey), Cell>,
}

impl TableContext {
    pub fn new(scenario: Scenario, cells: HashMap<(AssetKey, AccountKey), Cell>) -> Self {
        Self { scenario, cells }
    }

    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(scenario_path: P, table_path: Q) -> OptResult<Self> {
        let scenario = Scenario::load_from_file(scenario_path)?;
        let file = File::open(table_path.as_ref()).map_err(|e| {
            OptimizeError::Config(format!(
                "Could not open cell table at '{}': {}",
                table_path.as_ref().display(),
                e
            ))
        })?;
        let cells = load_cells_from_reader(file)?;
        Ok(Self::new(scenario, cells))
    }

    pub fn cell(&self, asset: &AssetKey, account: &AccountKey) -> Option<&Cell> {
        self.cells.get(&(asset.clone(), account.clone()))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn search_keys(&self) -> SearchKeys {
        SearchKeys {
            variable_accounts: self.scenario.variable_accounts.clone(),
            assets: self.scenario.assets.clone(),
            fixed_accounts: self.scenario.sorted_fixed_accounts(),
        }
    }

    /// Asset/account pairs the scenario needs but the table lacks.
    pub fn missing_cells(&self) -> Vec<(AssetKey, AccountKey)> {
        let sc = &self.scenario;
        sc.assets
            .iter()
            .flat_map(|asset| sc.variable_accounts.iter().map(move |acct| (asset, acct)))
            .filter(|(asset, acct)| self.cell(asset, acct).is_none())
            .map(|(asset, acct)| (asset.clone(), acct.clone()))
            .collect()
    }
}

/// Parses `asset,account,net_gain,abs_gain,sale_volume,wash,transactions` rows.
///
/// Short or non-numeric rows are skipped; a later row for the same pair wins.
pub fn load_cells_from_reader<R: Read>(reader: R) -> OptResult<HashMap<(AssetKey, AccountKey), Cell>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut cells = HashMap::new();
    let mut skipped_count = 0;

    for (row_idx, result) in rdr.records().enumerate() {
        let rec = result?;
        if rec.len() < 7 {
            skipped_count += 1;
            continue;
        }

        let numbers: Option<[f64; 4]> = (|| {
            Some([
                rec[2].parse().ok()?,
                rec[3].parse().ok()?,
                rec[4].parse().ok()?,
                rec[5].parse().ok()?,
            ])
        })();
        let (Some([net_gain, abs_gain, sale_volume, wash]), Ok(transactions)) =
            (numbers, rec[6].parse::<u32>())
        else {
            debug!("Skipping row {}: non-numeric figures", row_idx + 1);
            skipped_count += 1;
            continue;
        };

        cells.insert(
            (AssetKey::new(&rec[0]), AccountKey::new(&rec[1])),
            Cell {
                net_gain,
                abs_gain,
                sale_volume,
                wash,
                transactions,
            },
        );
    }

    if skipped_count > 0 {
        warn!("⚠️  Skipped {} invalid rows in cell table.", skipped_count);
    }

    Ok(cells)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableEvaluator;

impl TableEvaluator {
    fn trade_weight(flow_mode: f64, rank: usize) -> f64 {
        flow_mode + (1.0 - flow_mode) / (rank + 1) as f64
    }
}

impl Evaluator<TableContext> for TableEvaluator {
    fn evaluate(
        &self,
        ctx: &TableContext,
        params: &SearchParameters,
    ) -> Result<EvaluationResult, EvalError> {
        let accounts = &params.variable_account_keys;
        if accounts.is_empty() {
            return Err(EvalError::Allocation("no variable accounts".to_string()));
        }
        if !(0.0..=1.0).contains(&params.flow_mode) {
            return Err(EvalError::Other(format!(
                "flow mode {} outside [0, 1]",
                params.flow_mode
            )));
        }

        let mut net_tax_gains = 0.0;
        let mut abs_tax_gains = 0.0;
        let mut sale_volume = 0.0;
        let mut wash_amount = 0.0;
        let mut transaction_count = 0u32;
        let mut volume_by_account: HashMap<&AccountKey, f64> = HashMap::new();

        for (rank, asset) in params.asset_keys.iter().enumerate() {
            let account = &accounts[rank % accounts.len()];
            let cell = ctx.cell(asset, account).ok_or_else(|| EvalError::MissingCell {
                asset: asset.to_string(),
                account: account.to_string(),
            })?;

            let weight = Self::trade_weight(params.flow_mode, rank);
            net_tax_gains += cell.net_gain * weight;
            abs_tax_gains += cell.abs_gain * weight;
            sale_volume += cell.sale_volume * weight;
            wash_amount += cell.wash * weight;
            if cell.sale_volume * weight > 0.0 {
                transaction_count += cell.transactions;
            }

            let used = volume_by_account.entry(account).or_insert(0.0);
            *used += cell.sale_volume * weight;
            if params.is_strict {
                if let Some(&limit) = ctx.scenario.account_limits.get(account) {
                    if *used > limit {
                        return Err(EvalError::LimitExceededUnderStrict);
                    }
                }
            }
        }

        // Fixed accounts don't trade but still see wash exposure from the moves.
        for fixed in params.fixed_account_keys.iter() {
            for (rank, asset) in params.asset_keys.iter().enumerate() {
                if let Some(cell) = ctx.cell(asset, fixed) {
                    wash_amount += cell.wash * Self::trade_weight(params.flow_mode, rank);
                }
            }
        }

        Ok(EvaluationResult {
            net_tax_gains,
            abs_tax_gains,
            sale_volume,
            transaction_count,
            wash_amount,
            flow_mode: params.flow_mode,
            account_keys: params.variable_account_keys.clone(),
            asset_keys: params.asset_keys.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    fn context() -> TableContext {
        let table = "asset,account,net_gain,abs_gain,sale_volume,wash,transactions\n\
                     lc,ira,10,10,100,0,1\n\
                     lc,tax,-5,5,100,1,1\n\
                     bond,ira,2,2,50,0,1\n\
                     bond,tax,4,4,50,0,2\n";
        let cells = load_cells_from_reader(Cursor::new(table)).unwrap();
        let scenario = Scenario {
            variable_accounts: vec!["ira".into(), "tax".into()],
            assets: vec!["lc".into(), "bond".into()],
            account_limits: BTreeMap::from([("tax".into(), 60.0)]),
            ..Default::default()
        };
        TableContext::new(scenario, cells)
    }

    fn params(accounts: &[&str], assets: &[&str], flow_mode: f64, strict: bool) -> SearchParameters {
        SearchParameters {
            variable_account_keys: accounts.iter().map(|&a| a.into()).collect(),
            asset_keys: assets.iter().map(|&a| a.into()).collect(),
            flow_mode,
            is_strict: strict,
            fixed_account_keys: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn test_flat_trade_sums_cells() {
        let ctx = context();
        let res = TableEvaluator
            .evaluate(&ctx, &params(&["ira", "tax"], &["lc", "bond"], 1.0, false))
            .unwrap();
        assert_eq!(res.net_tax_gains, 14.0);
        assert_eq!(res.sale_volume, 150.0);
        assert_eq!(res.transaction_count, 3);
    }

    #[test]
    fn test_strict_limit_is_recoverable() {
        let ctx = context();
        let err = TableEvaluator
            .evaluate(&ctx, &params(&["tax", "ira"], &["lc", "bond"], 1.0, true))
            .unwrap_err();
        assert_eq!(err, EvalError::LimitExceededUnderStrict);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_cell_is_unexpected() {
        let ctx = context();
        let err = TableEvaluator
            .evaluate(&ctx, &params(&["ira"], &["gold"], 0.5, false))
            .unwrap_err();
        assert!(matches!(err, EvalError::MissingCell { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_skips_short_rows() {
        let table = "asset,account,net_gain,abs_gain,sale_volume,wash,transactions\n\
                     lc,ira,1,1,1,0,1\n\
                     bad,row\n\
                     lc,tax,x,1,1,0,1\n";
        let cells = load_cells_from_reader(Cursor::new(table)).unwrap();
        assert_eq!(cells.len(), 1);
    }
}
