pub mod bounded;

pub use self::bounded::BoundedResultSet;

use crate::error::{OptResult, OptimizeError};
use crate::model::{Candidate, CandidateOrdinal, EvaluationResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// A result attribute that can take part in a ranking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    NetTaxGains,
    AbsTaxGains,
    SaleVolume,
    TransactionCount,
    FlowMode,
    Wash,
}

impl Attribute {
    /// The attribute as ranked.
    ///
    /// `-0.0` is folded into `0.0` and every NaN into one positive NaN, so a
    /// NaN ranks after `+inf` ascending and ahead of it descending.
    pub fn value(self, result: &EvaluationResult) -> f64 {
        let raw = self.raw_value(result);
        if raw.is_nan() {
            f64::NAN
        } else {
            raw + 0.0
        }
    }

    fn raw_value(self, result: &EvaluationResult) -> f64 {
        match self {
            Attribute::NetTaxGains => result.net_tax_gains,
            Attribute::AbsTaxGains => result.abs_tax_gains,
            Attribute::SaleVolume => result.sale_volume,
            Attribute::TransactionCount => result.transaction_count as f64,
            Attribute::FlowMode => result.flow_mode,
            Attribute::Wash => result.wash_amount,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Attribute::NetTaxGains => "Net Gains",
            Attribute::AbsTaxGains => "Abs Gains",
            Attribute::SaleVolume => "Sale Volume",
            Attribute::TransactionCount => "Txns",
            Attribute::FlowMode => "Flow Mode",
            Attribute::Wash => "Wash",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[strum(serialize = "asc", serialize = "ascending")]
    Ascending,
    #[strum(serialize = "desc", serialize = "descending")]
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub attribute: Attribute,
    pub direction: Direction,
}

impl SortKey {
    pub fn new(attribute: Attribute, direction: Direction) -> Self {
        Self {
            attribute,
            direction,
        }
    }

    pub fn asc(attribute: Attribute) -> Self {
        Self::new(attribute, Direction::Ascending)
    }

    pub fn desc(attribute: Attribute) -> Self {
        Self::new(attribute, Direction::Descending)
    }

    /// `Less` means `a` ranks ahead of `b` on this key alone.
    pub fn compare(&self, a: &EvaluationResult, b: &EvaluationResult) -> Ordering {
        let ord = self.attribute.value(a).total_cmp(&self.attribute.value(b));
        match self.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }

    /// Maps the attribute to a `u64` whose natural order is this key's rank order.
    fn encode(&self, result: &EvaluationResult) -> u64 {
        let bits = self.attribute.value(result).to_bits();
        // Same order as f64::total_cmp.
        let ordered = if bits >> 63 == 1 {
            !bits
        } else {
            bits | (1 << 63)
        };
        match self.direction {
            Direction::Ascending => ordered,
            Direction::Descending => !ordered,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        write!(f, "{}:{}", self.attribute, dir)
    }
}

impl FromStr for SortKey {
    type Err = OptimizeError;

    /// Parses `attribute[:asc|:desc]`; direction defaults to ascending.
    fn from_str(s: &str) -> OptResult<Self> {
        let (attr, dir) = match s.trim().split_once(':') {
            Some((a, d)) => (a.trim(), Some(d.trim())),
            None => (s.trim(), None),
        };
        let attribute = Attribute::from_str(attr)
            .map_err(|_| OptimizeError::Config(format!("Unknown sort attribute '{}'", attr)))?;
        let direction = match dir {
            Some(d) => Direction::from_str(d)
                .map_err(|_| OptimizeError::Config(format!("Unknown sort direction '{}'", d)))?,
            None => Direction::Ascending,
        };
        Ok(Self::new(attribute, direction))
    }
}

/// Ordered list of keys defining a multi-key ranking.
///
/// Keys are compared in sequence and the first difference decides. An empty
/// spec treats every result as equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec(Vec<SortKey>);

/// Totally ordered rank of a candidate under one `SortSpec`; smaller is better.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankKey {
    keys: Vec<u64>,
    ordinal: CandidateOrdinal,
}

impl SortSpec {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Less` means `a` ranks ahead of `b`. `Equal` when every listed attribute ties.
    pub fn compare(&self, a: &EvaluationResult, b: &EvaluationResult) -> Ordering {
        self.0
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Like `compare`, but ties fall back to enumeration order so no two
    /// distinct candidates are ever equal.
    pub fn compare_candidates(&self, a: &Candidate, b: &Candidate) -> Ordering {
        self.compare(&a.result, &b.result)
            .then_with(|| a.ordinal.cmp(&b.ordinal))
    }

    pub fn rank_key(&self, candidate: &Candidate) -> RankKey {
        RankKey {
            keys: self.0.iter().map(|k| k.encode(&candidate.result)).collect(),
            ordinal: candidate.ordinal,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl FromStr for SortSpec {
    type Err = OptimizeError;

    /// Parses a comma separated list such as `netTaxGains:asc,saleVolume:desc`.
    fn from_str(s: &str) -> OptResult<Self> {
        let keys = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(SortKey::from_str)
            .collect::<OptResult<Vec<_>>>()?;

        for (i, key) in keys.iter().enumerate() {
            if keys[..i].iter().any(|k| k.attribute == key.attribute) {
                return Err(OptimizeError::Config(format!(
                    "Sort attribute '{}' listed more than once",
                    key.attribute
                )));
            }
        }
        Ok(Self(keys))
    }
}

impl From<Vec<SortKey>> for SortSpec {
    fn from(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(net: f64, volume: f64) -> EvaluationResult {
        EvaluationResult {
            net_tax_gains: net,
            abs_tax_gains: net.abs(),
            sale_volume: volume,
            transaction_count: 0,
            wash_amount: 0.0,
            flow_mode: 0.0,
            account_keys: vec![],
            asset_keys: vec![],
        }
    }

    #[test]
    fn test_encode_matches_compare() {
        let values = [-1e9, -2.5, -0.0, 0.0, 1e-300, 3.0, f64::INFINITY, f64::NAN, -f64::NAN];
        let key = SortKey::asc(Attribute::NetTaxGains);
        for a in values {
            for b in values {
                let (ra, rb) = (result(a, 0.0), result(b, 0.0));
                assert_eq!(key.encode(&ra).cmp(&key.encode(&rb)), key.compare(&ra, &rb));
            }
        }
    }

    #[test]
    fn test_signed_zeros_tie() {
        let key = SortKey::asc(Attribute::NetTaxGains);
        let (neg, pos) = (result(-0.0, 0.0), result(0.0, 0.0));
        assert_eq!(key.compare(&neg, &pos), Ordering::Equal);
        assert_eq!(key.encode(&neg), key.encode(&pos));
    }

    #[test]
    fn test_nan_ranks_past_infinity() {
        let inf = result(f64::INFINITY, 0.0);
        for nan in [f64::NAN, -f64::NAN] {
            let nan = result(nan, 0.0);
            assert_eq!(SortKey::asc(Attribute::NetTaxGains).compare(&nan, &inf), Ordering::Greater);
            assert_eq!(SortKey::desc(Attribute::NetTaxGains).compare(&nan, &inf), Ordering::Less);
        }
        assert_eq!(
            SortKey::asc(Attribute::NetTaxGains).compare(&result(f64::NAN, 0.0), &result(-f64::NAN, 0.0)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_parse_round_trips_display() {
        let spec: SortSpec = "netTaxGains:asc, saleVolume:desc".parse().unwrap();
        assert_eq!(spec.to_string(), "netTaxGains:asc,saleVolume:desc");
        assert_eq!(spec.keys()[1], SortKey::desc(Attribute::SaleVolume));
    }

    #[test]
    fn test_parse_rejects_duplicates_and_garbage() {
        assert!("wash,wash:desc".parse::<SortSpec>().is_err());
        assert!("height:asc".parse::<SortSpec>().is_err());
        assert!("wash:sideways".parse::<SortSpec>().is_err());
        assert!("".parse::<SortSpec>().unwrap().is_empty());
    }
}
