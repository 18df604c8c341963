// Command Executor Port
// Abstraction over bounded-time external process execution used by probes

use crate::domain::{CommandExecutionResult, CommandRequest, PingResult};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Command \"{command}\" execute timeout after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Executor saturated: all {max_workers} workers busy")]
    ResourceExhausted { max_workers: usize },

    #[error("Executor is shut down")]
    ExecutorShutdown,

    #[error("Offloaded task panicked: {0}")]
    TaskPanicked(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::IoError(err.to_string())
    }
}

/// Command Executor trait
///
/// Implementations:
/// - CommandRunner: spawns children, soft read budget + hard timeout via BoundedExecutor
/// - MockCommandExecutor: scripted results for tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command, reading its output for at most `read_budget`
    ///
    /// `Duration::ZERO` means no budget. When the budget expires the partial
    /// output is returned as a success.
    async fn exec(
        &self,
        request: &CommandRequest,
        read_budget: Duration,
    ) -> Result<CommandExecutionResult, ExecutionError>;

    /// Run a command off the caller's task and fail with `Timeout` when no
    /// result arrives within `timeout`. The offloaded work is not cancelled.
    async fn exec_with_hard_timeout(
        &self,
        request: &CommandRequest,
        timeout: Duration,
    ) -> Result<CommandExecutionResult, ExecutionError>;

    /// Ping `address` `count` times
    async fn ping(&self, address: &str, count: u32) -> PingResult;

    /// Working directory of a process, `None` when it cannot be determined
    async fn get_cmd_dir_by_pid(&self, pid: u32) -> Option<String>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock Command Executor with scripted answers
    #[derive(Default)]
    pub struct MockCommandExecutor {
        exec_result: Arc<Mutex<Option<Result<CommandExecutionResult, ExecutionError>>>>,
        ping_results: Arc<Mutex<HashMap<String, PingResult>>>,
        cmd_dirs: Arc<Mutex<HashMap<u32, String>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockCommandExecutor {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn set_exec_result(&self, result: Result<CommandExecutionResult, ExecutionError>) {
            *self.exec_result.lock().unwrap() = Some(result);
        }
        pub fn set_ping_result(&self, address: &str, result: PingResult) {
            self.ping_results
                .lock()
                .unwrap()
                .insert(address.to_string(), result);
        }
        pub fn set_cmd_dir(&self, pid: u32, dir: &str) {
            self.cmd_dirs.lock().unwrap().insert(pid, dir.to_string());
        }
        /// Every call recorded as "<op>:<arg>"
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
        fn scripted(&self) -> Result<CommandExecutionResult, ExecutionError> {
            self.exec_result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(CommandExecutionResult::success("")))
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn exec(
            &self,
            request: &CommandRequest,
            _read_budget: Duration,
        ) -> Result<CommandExecutionResult, ExecutionError> {
            self.record(format!("exec:{}", request.command));
            self.scripted()
        }
        async fn exec_with_hard_timeout(
            &self,
            request: &CommandRequest,
            _timeout: Duration,
        ) -> Result<CommandExecutionResult, ExecutionError> {
            self.record(format!("exec_with_hard_timeout:{}", request.command));
            self.scripted()
        }
        async fn ping(&self, address: &str, _count: u32) -> PingResult {
            self.record(format!("ping:{}", address));
            self.ping_results
                .lock()
                .unwrap()
                .get(address)
                .cloned()
                .unwrap_or_else(PingResult::unreachable)
        }
        async fn get_cmd_dir_by_pid(&self, pid: u32) -> Option<String> {
            self.record(format!("cwd:{}", pid));
            self.cmd_dirs.lock().unwrap().get(&pid).cloned()
        }
    }
}
