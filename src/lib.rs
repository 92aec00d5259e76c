pub mod config;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod optimizer;
pub mod ranking;

pub use error::{OptResult, OptimizeError};
// cmd and reports are binary modules (see main.rs).
