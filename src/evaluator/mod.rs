pub mod table;

use crate::model::{EvaluationResult, SearchParameters};
use thiserror::Error;

/// Why a single candidate could not be scored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A per-account limit was exceeded while running strict. Expected and counted.
    #[error("Account limit exceeded under strict mode")]
    LimitExceededUnderStrict,

    #[error("Missing cell: asset '{asset}' in account '{account}'")]
    MissingCell { asset: String, account: String },

    #[error("Allocation Error: {0}")]
    Allocation(String),

    #[error("Rebalance Error: {0}")]
    Rebalance(String),

    #[error("Evaluation Error: {0}")]
    Other(String),
}

impl EvalError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EvalError::LimitExceededUnderStrict)
    }
}

/// Scores one candidate configuration against a read-only context.
///
/// Implementations must be deterministic: the same context and parameters
/// always yield the same result or the same error.
pub trait Evaluator<C: ?Sized>: Send + Sync {
    fn evaluate(&self, context: &C, params: &SearchParameters)
        -> Result<EvaluationResult, EvalError>;
}

impl<C, F> Evaluator<C> for F
where
    C: ?Sized,
    F: Fn(&C, &SearchParameters) -> Result<EvaluationResult, EvalError> + Send + Sync,
{
    fn evaluate(
        &self,
        context: &C,
        params: &SearchParameters,
    ) -> Result<EvaluationResult, EvalError> {
        self(context, params)
    }
}
