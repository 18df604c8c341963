// Command runner - bounded-time external process execution
// reason: tokio::process so probes never block a scheduler thread
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use hostmon_core::domain::{CommandExecutionResult, CommandRequest, PingCode, PingResult};
use hostmon_core::port::{CommandExecutor, ExecutionError};

use crate::bounded_executor::BoundedExecutor;

/// Read budget for `ping`
pub const PING_READ_BUDGET: Duration = Duration::from_secs(30);

/// Read budget for process and profile lookups
pub const LOOKUP_READ_BUDGET: Duration = Duration::from_secs(10);

/// Shell profile scanned by `env_value_from_profile`
pub const PROFILE_PATH: &str = "/etc/profile";

const READ_CHUNK: usize = 4096;

/// Runs external commands under a soft read budget or a hard deadline
///
/// Hard-deadline calls are offloaded to the shared `BoundedExecutor`; a call
/// that times out leaves its child running to completion in the background.
#[derive(Clone)]
pub struct CommandRunner {
    executor: BoundedExecutor,
}

enum Collected {
    Complete { success: bool, output: String },
    Partial(String),
}

impl CommandRunner {
    pub fn new(executor: BoundedExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    /// Value assigned to `name` in the system shell profile
    ///
    /// Takes the first non-empty profile line mentioning `name` and returns
    /// its last non-empty `=`-separated segment.
    pub async fn env_value_from_profile(&self, name: &str) -> Option<String> {
        let request = CommandRequest::with_executable("cat", PROFILE_PATH, false);
        match self.exec(&request, LOOKUP_READ_BUDGET).await {
            Ok(result) if result.succeeded => parse_profile_value(&result.output, name),
            Ok(_) => None,
            Err(e) => {
                warn!(name = %name, error = %e, "Profile lookup failed");
                None
            }
        }
    }

    async fn run(
        request: &CommandRequest,
        read_budget: Duration,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        let argv = request.argv();
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecutionError::SpawnFailed("empty command".to_string()));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(command = %request, error = %e, "Failed to spawn command");
                ExecutionError::SpawnFailed(format!("{}: {}", request, e))
            })?;

        let deadline = (!read_budget.is_zero()).then(|| Instant::now() + read_budget);
        let collected = collect(&mut child, deadline).await;
        destroy(&mut child);

        match collected {
            Ok(Collected::Complete { success: true, output }) => {
                debug!(command = %request, "Command completed");
                Ok(CommandExecutionResult::success(output))
            }
            Ok(Collected::Complete { success: false, output }) => {
                error!(command = %request, output = %output.trim_end(), "Command exited with failure");
                Ok(CommandExecutionResult::failure(output))
            }
            Ok(Collected::Partial(output)) => {
                warn!(
                    command = %request,
                    read_budget_ms = read_budget.as_millis() as u64,
                    "Read budget exhausted, returning partial output"
                );
                Ok(CommandExecutionResult::success(output))
            }
            Err(e) => {
                error!(command = %request, error = %e, "Command I/O failed");
                Err(ExecutionError::from(e))
            }
        }
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(BoundedExecutor::default())
    }
}

#[async_trait]
impl CommandExecutor for CommandRunner {
    async fn exec(
        &self,
        request: &CommandRequest,
        read_budget: Duration,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        Self::run(request, read_budget).await
    }

    async fn exec_with_hard_timeout(
        &self,
        request: &CommandRequest,
        hard_timeout: Duration,
    ) -> Result<CommandExecutionResult, ExecutionError> {
        let (tx, rx) = oneshot::channel();
        let offloaded = request.clone();
        self.executor.submit(async move {
            let result = Self::run(&offloaded, Duration::ZERO).await;
            let _ = tx.send(result);
        })?;

        match timeout(hard_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Sender dropped without a value: the task panicked
            Ok(Err(_)) => Err(ExecutionError::TaskPanicked(format!(
                "{} ended without a result",
                request
            ))),
            Err(_) => {
                let timeout_ms = hard_timeout.as_millis() as u64;
                error!(command = %request, timeout_ms, "Command execute timeout");
                Err(ExecutionError::Timeout {
                    command: request.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    async fn ping(&self, address: &str, count: u32) -> PingResult {
        let request = CommandRequest::with_executable("ping", format!("-c {} {}", count, address), true);
        match self.exec(&request, PING_READ_BUDGET).await {
            Ok(result) if result.succeeded => {
                let ping = parse_ping_output(&result.output);
                if ping.code == PingCode::Unreachable {
                    warn!(address = %address, "Ping address unreachable");
                }
                ping
            }
            Ok(_) => PingResult::execution_failed(),
            Err(e) => {
                error!(address = %address, error = %e, "Ping execution failed");
                PingResult::execution_failed()
            }
        }
    }

    async fn get_cmd_dir_by_pid(&self, pid: u32) -> Option<String> {
        let request = CommandRequest::with_executable("lsof", format!("-p {}", pid), true);
        match self.exec(&request, LOOKUP_READ_BUDGET).await {
            Ok(result) if result.succeeded => parse_cwd(&result.output),
            Ok(_) => None,
            Err(e) => {
                warn!(pid, error = %e, "Working directory lookup failed");
                None
            }
        }
    }
}

/// Drain stderr and stdout, stderr first in the returned text
async fn collect(child: &mut Child, deadline: Option<Instant>) -> io::Result<Collected> {
    let stderr = child.stderr.take();
    let stdout = child.stdout.take();
    let mut err_buf = Vec::new();
    let mut out_buf = Vec::new();

    // Both pipes are read together so a chatty stdout cannot stall on a full
    // pipe while stderr is still open
    let (err_done, out_done) = tokio::try_join!(
        drain(stderr, &mut err_buf, deadline),
        drain(stdout, &mut out_buf, deadline)
    )?;

    err_buf.extend_from_slice(&out_buf);
    let output = String::from_utf8_lossy(&err_buf).into_owned();

    if !(err_done && out_done) {
        return Ok(Collected::Partial(output));
    }

    let status = match deadline {
        Some(deadline) => match timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => return Ok(Collected::Partial(output)),
        },
        None => child.wait().await?,
    };

    Ok(Collected::Complete {
        success: status.success(),
        output,
    })
}

/// Read `reader` to EOF; false when the deadline cut it short
async fn drain<R>(reader: Option<R>, buf: &mut Vec<u8>, deadline: Option<Instant>) -> io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(true);
    };
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = match deadline {
            Some(deadline) => match timeout_at(deadline, reader.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => return Ok(false),
            },
            None => reader.read(&mut chunk).await?,
        };
        if read == 0 {
            return Ok(true);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

/// Release the child on every exit path
fn destroy(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
            return;
        }
    }

    // Already reaped or not unix
    let _ = child.start_kill();
}

/// Collect every `time=<ms>` sample in ping output
pub fn parse_ping_output(output: &str) -> PingResult {
    let samples: Vec<f64> = output
        .lines()
        .flat_map(|line| line.split(' '))
        .filter_map(latency_sample)
        .collect();
    PingResult::from_samples(&samples)
}

fn latency_sample(token: &str) -> Option<f64> {
    const MARKER: &str = "time=";

    let lower = token.to_ascii_lowercase();
    let start = lower.find(MARKER)? + MARKER.len();
    let value = lower[start..].trim_end_matches("ms");
    match value.parse::<f64>() {
        Ok(sample) => Some(sample),
        Err(_) => {
            debug!(token = %token, "Skipping unparsable latency token");
            None
        }
    }
}

/// Last column of the first `cwd` line in `lsof` output
pub fn parse_cwd(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.to_lowercase().contains("cwd"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

/// Value of `name` in shell profile text
pub fn parse_profile_value(output: &str, name: &str) -> Option<String> {
    let line = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| line.contains(name))?;

    let value = line.split('=').filter(|s| !s.is_empty()).last()?;
    info!(name = %name, value = %value, "Resolved profile variable");
    Some(value.to_string())
}
