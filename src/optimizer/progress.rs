use serde::Serialize;
use std::time::{Duration, Instant};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum RunStatus {
    Idle,
    Running,
    Cancelling,
}

/// Wall clock for one run. Stopping freezes the elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunClock {
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl RunClock {
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.stopped_at = None;
    }

    pub fn stop(&mut self) {
        if self.started_at.is_some() && self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

/// Point-in-time view of a run, safe to hand to a UI or logger.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub status: RunStatus,
    pub work_units_total: u64,
    pub work_units_completed: u64,
    pub candidates_evaluated: u64,
    pub recoverable_failures: u64,
    pub unexpected_failures: u64,
    /// Evaluator calls made by units that were cancelled mid-way.
    pub discarded_calls: u64,
    pub search_space: Option<u128>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Evaluator calls made by units whose results were merged.
    pub fn candidates_attempted(&self) -> u64 {
        self.candidates_evaluated + self.recoverable_failures + self.unexpected_failures
    }

    pub fn candidates_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.candidates_attempted() as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of the search space accounted for, in `[0, 1]`.
    pub fn fraction_complete(&self) -> f64 {
        match self.search_space {
            Some(total) if total > 0 => {
                (self.candidates_attempted() as f64 / total as f64).min(1.0)
            }
            _ if self.work_units_total > 0 => {
                self.work_units_completed as f64 / self.work_units_total as f64
            }
            _ => 0.0,
        }
    }

    /// Projected wall time for the whole search at the current rate.
    ///
    /// `None` before any rate is known, or when the projection does not fit
    /// in a `Duration`.
    pub fn estimated_total(&self) -> Option<Duration> {
        let rate = self.candidates_per_second();
        let total = self.search_space?;
        if rate > 0.0 {
            Duration::try_from_secs_f64(total as f64 / rate).ok()
        } else {
            None
        }
    }

    /// Share of attempted candidates rejected by a strict limit.
    pub fn recoverable_failure_rate(&self) -> f64 {
        let attempted = self.candidates_attempted();
        if attempted > 0 {
            self.recoverable_failures as f64 / attempted as f64
        } else {
            0.0
        }
    }
}

/// Receives progress while a search runs.
/// Boolean return value indicates if the search should continue (true) or abort (false).
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &ProgressSnapshot) -> bool;
}
