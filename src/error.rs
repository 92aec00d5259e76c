use crate::evaluator::EvalError;
use crate::optimizer::RunStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("No variable account keys to permute")]
    NoVariableAccounts,

    #[error("No asset keys to permute")]
    NoAssets,

    #[error("No flow modes to probe")]
    NoFlowModes,

    #[error("Result capacity must be positive")]
    ZeroCapacity,

    #[error("Worker count must be positive")]
    ZeroWorkers,

    #[error("Optimizer is busy ({0})")]
    Busy(RunStatus),

    #[error("{0}")]
    Eval(#[from] EvalError),

    #[error("Worker Pool Error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl OptimizeError {
    /// True for the refusals `start` issues on bad inputs.
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self,
            OptimizeError::NoVariableAccounts
                | OptimizeError::NoAssets
                | OptimizeError::NoFlowModes
                | OptimizeError::ZeroCapacity
                | OptimizeError::ZeroWorkers
        )
    }
}

pub type OptResult<T> = Result<T, OptimizeError>;
