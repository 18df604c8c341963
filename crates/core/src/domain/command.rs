// Command execution results (CommandRunner)

use serde::{Deserialize, Serialize};

/// Default interpreter used when no executable is given
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// What to launch
///
/// Without an `executable` the raw command string goes to `/bin/sh -c`.
/// With one, `command` is either passed as a single argument or, when
/// `split_args` is set, tokenized on whitespace into argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub executable: Option<String>,
    pub command: String,
    pub split_args: bool,
}

impl CommandRequest {
    /// Shell command run through the default interpreter
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            executable: None,
            command: command.into(),
            split_args: false,
        }
    }

    /// Command run by a custom interpreter
    pub fn with_executable(
        executable: impl Into<String>,
        command: impl Into<String>,
        split_args: bool,
    ) -> Self {
        Self {
            executable: Some(executable.into()),
            command: command.into(),
            split_args,
        }
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        let mut argv = match &self.executable {
            Some(exe) => vec![exe.clone()],
            None => vec![DEFAULT_SHELL.to_string(), "-c".to_string()],
        };
        if self.split_args {
            argv.extend(self.command.split_whitespace().map(str::to_string));
        } else {
            argv.push(self.command.clone());
        }
        argv
    }
}

impl std::fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.executable.as_deref().unwrap_or(DEFAULT_SHELL),
            self.command
        )
    }
}

/// Outcome of running an external command
///
/// `output` may be partial when the read budget expired before the
/// command finished writing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExecutionResult {
    pub succeeded: bool,
    pub output: String,
}

impl CommandExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output: output.into(),
        }
    }

    /// Output split into lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }
}

/// Ping result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PingCode {
    /// At least one reply carried a latency sample
    Success,
    /// The command ran but no reply arrived
    Unreachable,
    /// The ping command itself failed
    ExecutionFailed,
}

impl PingCode {
    /// Numeric code as reported upstream (1, -1, -2)
    pub fn as_i32(self) -> i32 {
        match self {
            PingCode::Success => 1,
            PingCode::Unreachable => -1,
            PingCode::ExecutionFailed => -2,
        }
    }
}

impl std::fmt::Display for PingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Result of `ping` against one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub code: PingCode,
    pub success_count: usize,
    /// Mean latency in milliseconds, rounded to 3 decimals
    pub average_latency_ms: f64,
}

impl PingResult {
    pub fn unreachable() -> Self {
        Self {
            code: PingCode::Unreachable,
            success_count: 0,
            average_latency_ms: 0.0,
        }
    }

    pub fn execution_failed() -> Self {
        Self {
            code: PingCode::ExecutionFailed,
            success_count: 0,
            average_latency_ms: 0.0,
        }
    }

    /// Build a result from parsed latency samples
    ///
    /// An empty sample set means the host never answered.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::unreachable();
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        Self {
            code: PingCode::Success,
            success_count: samples.len(),
            average_latency_ms: (mean * 1000.0).round() / 1000.0,
        }
    }
}
