// Domain Layer - Pure types shared by activation, connection caching and command execution

pub mod command;
pub mod connection;
pub mod error;
pub mod job;
pub mod plugin;

// Re-exports
pub use command::{CommandExecutionResult, CommandRequest, PingCode, PingResult};
pub use connection::{CacheKey, ProcessInfo};
pub use error::DomainError;
pub use job::{
    CronSchedule, JobActivationOutcome, JobPayload, ScheduleJobResult, ScheduledJobSpec, TriggerSpec,
};
pub use plugin::{ActivationPolicy, PluginCategory, PluginDescriptor, PreconditionContext};
