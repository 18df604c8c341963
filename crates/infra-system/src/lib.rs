// Hostmon Infrastructure - System Adapters
// Implements: CommandExecutor, ProcessSource, EndpointResolver, ManagementConnector, JobScheduler

pub mod bounded_executor;
pub mod command_runner;
pub mod endpoint_resolver;
pub mod interval_scheduler;
pub mod process_source_impl;
pub mod tcp_connector;

pub use bounded_executor::{BoundedExecutor, BoundedExecutorConfig};
pub use command_runner::CommandRunner;
pub use endpoint_resolver::CmdlineEndpointResolver;
pub use interval_scheduler::IntervalJobScheduler;
pub use process_source_impl::{CommandLineSource, SysinfoProcessSource};
pub use tcp_connector::TcpManagementConnector;
