use super::{RankKey, SortSpec};
use crate::error::{OptResult, OptimizeError};
use crate::model::Candidate;
use std::collections::BTreeMap;

/// Keeps the best `capacity` candidates seen since the last `clear`.
///
/// Entries are keyed by their [`RankKey`], so the worst member is always the
/// last key and push/evict are `O(log capacity)`. Candidates that tie on every
/// sort attribute are ordered by enumeration ordinal: the earlier candidate
/// survives at the capacity boundary, whatever order they were pushed in.
#[derive(Debug, Clone)]
pub struct BoundedResultSet {
    capacity: usize,
    spec: SortSpec,
    entries: BTreeMap<RankKey, Candidate>,
}

impl BoundedResultSet {
    pub fn new(capacity: usize, spec: SortSpec) -> OptResult<Self> {
        if capacity == 0 {
            return Err(OptimizeError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            spec,
            entries: BTreeMap::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn spec(&self) -> &SortSpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offers a candidate. Returns true if it was kept.
    ///
    /// A candidate already present (same ordinal and attributes) is not added twice.
    pub fn push(&mut self, candidate: Candidate) -> bool {
        let key = self.spec.rank_key(&candidate);
        if self.entries.contains_key(&key) {
            return false;
        }

        if self.entries.len() >= self.capacity {
            match self.entries.last_key_value() {
                Some((worst, _)) if key < *worst => {
                    self.entries.pop_last();
                }
                _ => return false,
            }
        }

        self.entries.insert(key, candidate);
        true
    }

    /// Pushes every entry of `other`. The final membership does not depend on
    /// the order in which sets are merged.
    pub fn merge(&mut self, other: BoundedResultSet) -> usize {
        other
            .entries
            .into_values()
            .map(|candidate| self.push(candidate))
            .filter(|&kept| kept)
            .count()
    }

    /// Empties the set and installs a new ranking.
    pub fn clear(&mut self, spec: SortSpec) {
        self.entries.clear();
        self.spec = spec;
    }

    /// Entries best first.
    pub fn snapshot(&self) -> Vec<Candidate> {
        self.entries.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.values()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.entries.first_key_value().map(|(_, c)| c)
    }

    pub fn worst(&self) -> Option<&Candidate> {
        self.entries.last_key_value().map(|(_, c)| c)
    }
}

impl Default for BoundedResultSet {
    fn default() -> Self {
        Self {
            capacity: crate::config::DEFAULT_CAPACITY,
            spec: SortSpec::default(),
            entries: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CandidateOrdinal, EvaluationResult};
    use crate::ranking::{Attribute, SortKey};

    fn cand(asset: u64, net: f64) -> Candidate {
        Candidate::new(
            CandidateOrdinal::new(0, 0, asset),
            EvaluationResult {
                net_tax_gains: net,
                abs_tax_gains: net.abs(),
                sale_volume: 0.0,
                transaction_count: 0,
                wash_amount: 0.0,
                flow_mode: 0.0,
                account_keys: vec![],
                asset_keys: vec![],
            },
        )
    }

    fn by_net() -> SortSpec {
        SortSpec::new(vec![SortKey::asc(Attribute::NetTaxGains)])
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedResultSet::new(0, by_net()),
            Err(OptimizeError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_evicts_worst_when_full() {
        let mut set = BoundedResultSet::new(2, by_net()).unwrap();
        assert!(set.push(cand(0, 5.0)));
        assert!(set.push(cand(1, 3.0)));
        assert!(set.push(cand(2, 1.0)));
        assert!(!set.push(cand(3, 9.0)));

        let nets: Vec<f64> = set.snapshot().iter().map(|c| c.result.net_tax_gains).collect();
        assert_eq!(nets, vec![1.0, 3.0]);
    }

    #[test]
    fn test_boundary_tie_keeps_earlier_ordinal() {
        let mut set = BoundedResultSet::new(1, by_net()).unwrap();
        set.push(cand(7, 2.0));
        assert!(set.push(cand(4, 2.0)));
        assert!(!set.push(cand(9, 2.0)));
        assert_eq!(set.best().unwrap().ordinal.asset, 4);
    }

    #[test]
    fn test_duplicate_push_ignored() {
        let mut set = BoundedResultSet::new(3, by_net()).unwrap();
        assert!(set.push(cand(1, 1.0)));
        assert!(!set.push(cand(1, 1.0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_clear_swaps_spec() {
        let mut set = BoundedResultSet::new(3, by_net()).unwrap();
        set.push(cand(1, 1.0));
        let spec = SortSpec::new(vec![SortKey::desc(Attribute::NetTaxGains)]);
        set.clear(spec.clone());
        assert!(set.is_empty());
        assert_eq!(set.spec(), &spec);
    }
}
