// Application Layer - Activation control plane and connection cache

pub mod activation;
pub mod connection_cache;
pub mod constants;
pub mod plugin_runner;
pub mod shutdown;

// Re-exports
pub use activation::{
    ActivationController, ActivationRegistry, ActivationRequest, ActivationState, Precondition,
};
pub use connection_cache::{ConnectionCache, ConnectionCacheConfig, ConnectionCacheEntry};
pub use plugin_runner::{DiscoveryRefreshJob, PluginRunner, RunSummary};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
