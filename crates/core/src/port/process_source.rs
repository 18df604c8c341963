// Process enumeration port
use async_trait::async_trait;

use crate::domain::ProcessInfo;

/// Source of currently running local processes
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// Snapshot of running processes with at least pid and display name
    ///
    /// # Example
    /// ```text
    /// let procs = source.list_processes().await;
    /// let jvms = procs.iter().filter(|p| p.display_name.contains("logstash"));
    /// ```
    async fn list_processes(&self) -> Vec<ProcessInfo>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock ProcessSource whose process table tests can rewrite
    #[derive(Default, Clone)]
    pub struct MockProcessSource {
        processes: Arc<Mutex<Vec<ProcessInfo>>>,
    }

    impl MockProcessSource {
        pub fn new(processes: Vec<ProcessInfo>) -> Self {
            Self {
                processes: Arc::new(Mutex::new(processes)),
            }
        }
        /// `count` processes named `name` with pids starting at `first_pid`
        pub fn with_instances(name: &str, first_pid: u32, count: u32) -> Self {
            let source = Self::default();
            source.spawn_instances(name, first_pid, count);
            source
        }
        pub fn spawn_instances(&self, name: &str, first_pid: u32, count: u32) {
            let mut procs = self.processes.lock().unwrap();
            for pid in first_pid..first_pid + count {
                procs.push(ProcessInfo::new(pid, format!("{} --instance {}", name, pid)));
            }
        }
        pub fn kill(&self, pid: u32) {
            self.processes.lock().unwrap().retain(|p| p.pid != pid);
        }
        pub fn set_processes(&self, processes: Vec<ProcessInfo>) {
            *self.processes.lock().unwrap() = processes;
        }
    }

    #[async_trait]
    impl ProcessSource for MockProcessSource {
        async fn list_processes(&self) -> Vec<ProcessInfo> {
            self.processes.lock().unwrap().clone()
        }
    }
}
