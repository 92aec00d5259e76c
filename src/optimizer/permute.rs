use itertools::Itertools;
use std::sync::Arc;

/// All orderings of a fixed key sequence, generated on demand.
///
/// Iteration follows lexicographic order over input positions, so the first
/// permutation is the input itself. Every call to [`iter`](Self::iter)
/// restarts from the beginning.
#[derive(Debug, Clone)]
pub struct PermutationSpace<T> {
    items: Arc<[T]>,
}

impl<T: Clone> PermutationSpace<T> {
    pub fn new(items: impl Into<Arc<[T]>>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of permutations, or `None` if it does not fit a `u64`.
    pub fn count(&self) -> Option<u64> {
        factorial(self.items.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec<T>> + Send + 'static
    where
        T: Send + Sync + 'static,
    {
        let items = Arc::clone(&self.items);
        (0..items.len())
            .permutations(items.len())
            .map(move |order| order.into_iter().map(|i| items[i].clone()).collect())
    }
}

pub fn factorial(n: usize) -> Option<u64> {
    (1..=n as u64).try_fold(1u64, |acc, k| acc.checked_mul(k))
}

/// `|flow_modes| * accounts! * assets!`, or `None` on overflow.
pub fn search_space_size(flow_modes: usize, accounts: usize, assets: usize) -> Option<u128> {
    let accounts = u128::from(factorial(accounts)?);
    let assets = u128::from(factorial(assets)?);
    (flow_modes as u128).checked_mul(accounts)?.checked_mul(assets)
}
