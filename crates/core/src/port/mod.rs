// Port Layer - Interfaces for external collaborators

pub mod command_executor;
pub mod job_scheduler;
pub mod management;
pub mod plugin_registry;
pub mod probes;
pub mod process_matcher;
pub mod process_source;

// Re-exports
pub use command_executor::{CommandExecutor, ExecutionError};
pub use job_scheduler::{CollectionJob, JobScheduler};
pub use management::{
    ConnectionError, Credentials, EndpointResolver, ManagementConnection, ManagementConnector,
    ManagementEndpoint,
};
pub use plugin_registry::{InMemoryPluginRegistry, PluginRegistry};
pub use probes::{AddressDetector, DatabaseProbe, SnmpSessionProbe};
pub use process_matcher::{ExactMatcher, ProcessMatcher, RegexMatcher, SubstringMatcher};
pub use process_source::ProcessSource;
