use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::debug;

/// Scheduling preference for worker threads. Advisory only.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    ValueEnum,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Adaptive,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Unix nice level to request for a worker thread, if any.
    ///
    /// Raising priority needs privileges, so `High` leaves threads at the
    /// process default just like `Adaptive`.
    pub fn nice_level(self) -> Option<i32> {
        match self {
            Priority::Adaptive | Priority::High => None,
            Priority::Medium => Some(5),
            Priority::Low => Some(10),
        }
    }

    /// Applies the hint to the calling thread. Failures are ignored.
    ///
    /// Linux only. Elsewhere `setpriority` applies to the whole process,
    /// including the caller's thread, so the hint is skipped.
    pub fn apply_to_current_thread(self) {
        let Some(nice) = self.nice_level() else {
            return;
        };

        #[cfg(target_os = "linux")]
        {
            // `who = 0` with PRIO_PROCESS targets the calling thread on Linux.
            let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
            if rc != 0 {
                debug!("setpriority({}) refused; keeping default priority", nice);
            } else {
                debug!("📉 Worker priority lowered (nice {})", nice);
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            debug!(
                "Priority hint '{}' (nice {}) not supported on this platform",
                self, nice
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_and_levels() {
        assert_eq!(<Priority as FromStr>::from_str("LOW").unwrap(), Priority::Low);
        assert_eq!(Priority::default(), Priority::Adaptive);
        assert_eq!(Priority::High.nice_level(), None);
        assert_eq!(Priority::Low.nice_level(), Some(10));
        assert_eq!(Priority::Medium.to_string(), "medium");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_hint_stays_on_worker_thread() {
        let before = unsafe { libc::getpriority(libc::PRIO_PROCESS, 0) };
        std::thread::spawn(|| Priority::Low.apply_to_current_thread())
            .join()
            .unwrap();
        assert_eq!(unsafe { libc::getpriority(libc::PRIO_PROCESS, 0) }, before);
    }
}
