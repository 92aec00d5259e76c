pub mod permute;
pub mod priority;
pub mod progress;
pub mod runner;
pub mod unit;

pub use self::permute::{factorial, search_space_size, PermutationSpace};
pub use self::priority::Priority;
pub use self::progress::{ProgressCallback, ProgressSnapshot, RunClock, RunStatus};
pub use self::runner::{ResultSlot, RunOptions, SearchCoordinator, SearchKeys};
pub use self::unit::{CancelToken, UnitCounters, UnitOutcome, UnitReport, WorkUnit};
