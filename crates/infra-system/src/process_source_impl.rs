// Process source implementation
// reason: sysinfo for cross-platform process enumeration
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sysinfo::{Pid, Process, ProcessRefreshKind, System, UpdateKind};
use tracing::debug;

use hostmon_core::domain::ProcessInfo;
use hostmon_core::port::ProcessSource;

/// Raw command line of a running process
pub trait CommandLineSource: Send + Sync {
    fn command_line(&self, pid: u32) -> Option<Vec<String>>;
}

/// Process source backed by sysinfo
///
/// The display name is the full command line, falling back to the
/// executable name for processes whose arguments are not readable.
/// Threads are listed by sysinfo as their own entries on Linux; they are
/// skipped so one process is reported once.
#[derive(Clone)]
pub struct SysinfoProcessSource {
    system: Arc<Mutex<System>>,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    fn system(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

fn display_name(process: &Process) -> String {
    let cmd = process.cmd();
    if cmd.is_empty() {
        process.name().to_string()
    } else {
        cmd.join(" ")
    }
}

#[async_trait]
impl ProcessSource for SysinfoProcessSource {
    async fn list_processes(&self) -> Vec<ProcessInfo> {
        let mut sys = self.system();
        sys.refresh_processes_specifics(
            ProcessRefreshKind::new().with_cmd(UpdateKind::OnlyIfNotSet),
        );

        let processes: Vec<ProcessInfo> = sys
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessInfo::new(pid.as_u32(), display_name(process)))
            .collect();

        debug!(count = processes.len(), "Process list refreshed");
        processes
    }
}

impl CommandLineSource for SysinfoProcessSource {
    fn command_line(&self, pid: u32) -> Option<Vec<String>> {
        let pid = Pid::from_u32(pid);
        let mut sys = self.system();
        let kind = ProcessRefreshKind::new().with_cmd(UpdateKind::Always);
        if !sys.refresh_process_specifics(pid, kind) {
            return None;
        }
        sys.process(pid).map(|p| p.cmd().to_vec())
    }
}
