use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(key: impl AsRef<str>) -> Self {
                Self(Arc::from(key.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", &*self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

key_type!(
    /// Identifies an account whose position in the ordering is searched.
    AccountKey
);
key_type!(
    /// Identifies an asset class whose position in the ordering is searched.
    AssetKey
);

/// One candidate configuration handed to the evaluator.
///
/// The order of `variable_account_keys` and `asset_keys` IS the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub variable_account_keys: Vec<AccountKey>,
    pub asset_keys: Vec<AssetKey>,
    pub flow_mode: f64,
    pub is_strict: bool,
    pub fixed_account_keys: Arc<[AccountKey]>,
}

/// Scored outcome of one candidate. Produced only by an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub net_tax_gains: f64,
    pub abs_tax_gains: f64,
    pub sale_volume: f64,
    pub transaction_count: u32,
    pub wash_amount: f64,
    pub flow_mode: f64,
    pub account_keys: Vec<AccountKey>,
    pub asset_keys: Vec<AssetKey>,
}

/// Position of a candidate in the canonical enumeration of the search space.
///
/// Field order gives the enumeration order: flow mode, then account
/// permutation, then asset permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateOrdinal {
    pub flow: u64,
    pub account: u64,
    pub asset: u64,
}

impl CandidateOrdinal {
    pub fn new(flow: u64, account: u64, asset: u64) -> Self {
        Self {
            flow,
            account,
            asset,
        }
    }
}

impl fmt::Display for CandidateOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.flow, self.account, self.asset)
    }
}

/// An evaluation result tagged with where it came from.
///
/// The ordinal is the candidate's stable identity; the result is shared
/// between every result set it lands in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub ordinal: CandidateOrdinal,
    pub result: Arc<EvaluationResult>,
}

impl Candidate {
    pub fn new(ordinal: CandidateOrdinal, result: EvaluationResult) -> Self {
        Self {
            ordinal,
            result: Arc::new(result),
        }
    }

    pub fn id(&self) -> CandidateOrdinal {
        self.ordinal
    }
}
