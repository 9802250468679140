//! Process presence sampling.
//!
//! One query per tick: "is a process with this exact name (ignoring case)
//! running right now?". Failures are per-tick and never escape `sample`.

use sysinfo::{ProcessRefreshKind, System};
use tracing::{debug, warn};

use crate::error::MonitorError;

pub trait ProcessMonitor {
    fn is_target_running(&mut self, process_name: &str) -> Result<bool, MonitorError>;
}

impl<M: ProcessMonitor + ?Sized> ProcessMonitor for &mut M {
    fn is_target_running(&mut self, process_name: &str) -> Result<bool, MonitorError> {
        (**self).is_target_running(process_name)
    }
}

/// Live process table via `sysinfo`. The `System` is kept between ticks so
/// refreshes only pay for the process list, not for re-initialisation.
pub struct SysinfoMonitor {
    system: System,
}

impl SysinfoMonitor {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMonitor for SysinfoMonitor {
    fn is_target_running(&mut self, process_name: &str) -> Result<bool, MonitorError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(MonitorError::Unavailable(
                "process listing is not supported on this platform".to_string(),
            ));
        }

        // Names and pids only; cpu/memory/cmd are not needed for presence.
        self.system.refresh_processes_specifics(ProcessRefreshKind::new());

        let target = process_name.to_lowercase();
        let processes = self.system.processes();
        // Our own process is always present, so an empty table means the read failed.
        if processes.is_empty() {
            return Err(MonitorError::Unavailable(
                "process table returned no entries".to_string(),
            ));
        }

        Ok(processes
            .values()
            .any(|process| matches_lowercased(process.name(), &target)))
    }
}

pub fn names_match(candidate: &str, target: &str) -> bool {
    matches_lowercased(candidate, &target.to_lowercase())
}

/// `target` must already be lowercased. ASCII names compare without allocating.
fn matches_lowercased(candidate: &str, target: &str) -> bool {
    if candidate.is_ascii() {
        candidate.eq_ignore_ascii_case(target)
    } else {
        candidate.to_lowercase() == target
    }
}

/// Presence signal for one tick. A failed query counts as "not running".
pub fn sample<M: ProcessMonitor + ?Sized>(monitor: &mut M, process_name: &str) -> bool {
    match monitor.is_target_running(process_name) {
        Ok(present) => {
            debug!(process = %process_name, present, "Sampled process table");
            present
        }
        Err(err) => {
            warn!(
                error = %err,
                process = %process_name,
                "Process query failed; treating target as not running"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ProcessMonitor for Failing {
        fn is_target_running(&mut self, _process_name: &str) -> Result<bool, MonitorError> {
            Err(MonitorError::Unavailable("boom".to_string()))
        }
    }

    #[test]
    fn names_match_ignores_case() {
        assert!(names_match("CS2.EXE", "cs2.exe"));
        assert!(names_match("cs2.exe", "cs2.exe"));
        assert!(!names_match("cs2.exe.bak", "cs2.exe"));
        assert!(!names_match("cs2", "cs2.exe"));
    }

    #[test]
    fn names_match_handles_non_ascii_names() {
        assert!(names_match("ÉLDEN.exe", "élden.EXE"));
        assert!(!names_match("élden.exe", "elden.exe"));
    }

    #[test]
    fn sample_treats_errors_as_absent() {
        assert!(!sample(&mut Failing, "cs2.exe"));
    }

    #[test]
    fn sysinfo_does_not_find_nonexistent_process() {
        let mut monitor = SysinfoMonitor::new();
        let result = monitor.is_target_running("definitely-not-a-real-process-7f3a9.exe");
        assert_eq!(result, Ok(false));
    }

    #[test]
    fn sysinfo_sampling_is_idempotent_without_table_changes() {
        let mut monitor = SysinfoMonitor::new();
        let name = "definitely-not-a-real-process-7f3a9.exe";
        let first = sample(&mut monitor, name);
        let second = sample(&mut monitor, name);
        assert_eq!(first, second);
    }
}
