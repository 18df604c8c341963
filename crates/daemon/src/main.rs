//! Hostmon Agent - Main Entry Point
//! Discovers local services, activates their collection jobs and keeps the
//! management connection pool healthy until Ctrl+C.

mod config;
mod logging;
mod plugins;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use hostmon_core::application::{
    shutdown_channel, ActivationController, ActivationRegistry, ConnectionCache, PluginRunner,
    ShutdownToken,
};
use hostmon_core::port::{CommandExecutor, ProcessMatcher, SubstringMatcher};
use hostmon_infra_system::{
    BoundedExecutor, CmdlineEndpointResolver, CommandRunner, IntervalJobScheduler,
    SysinfoProcessSource, TcpManagementConnector,
};

use crate::config::AgentConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const RUNTIME_HOME_VARIABLE: &str = "JAVA_HOME";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration + logging
    let config = AgentConfig::from_env()?;
    let _log_guard = logging::init(&config)?;

    info!("Hostmon agent v{} starting...", VERSION);

    // 2. Adapters (DI wiring)
    let executor = BoundedExecutor::new(config.executor);
    let commands = Arc::new(CommandRunner::new(executor.clone()));
    match commands.env_value_from_profile(RUNTIME_HOME_VARIABLE).await {
        Some(home) => info!(variable = RUNTIME_HOME_VARIABLE, value = %home, "Runtime home found"),
        None => warn!(variable = RUNTIME_HOME_VARIABLE, "Runtime home not set in profile"),
    }

    let processes = Arc::new(SysinfoProcessSource::new());
    let matcher: Arc<dyn ProcessMatcher> = Arc::new(SubstringMatcher);
    let resolver = Arc::new(CmdlineEndpointResolver::new(
        processes.clone(),
        config.credentials.clone(),
    ));
    let cache = Arc::new(ConnectionCache::new(
        processes.clone(),
        Arc::clone(&matcher),
        resolver,
        Arc::new(TcpManagementConnector::new()),
        config.cache_config(),
    ));

    // 3. Control plane
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let (fatal_tx, fatal_rx) = shutdown_channel();
    let scheduler = Arc::new(IntervalJobScheduler::new(shutdown_rx).with_fatal_signal(fatal_tx));
    let controller = Arc::new(ActivationController::new(
        Arc::new(ActivationRegistry::new()),
        scheduler.clone(),
    ));
    let command_port: Arc<dyn CommandExecutor> = commands;
    let registry = Arc::new(plugins::build_registry(&config, cache.clone(), command_port));
    let runner = Arc::new(PluginRunner::new(registry, controller, processes, matcher));

    // 4. Run until Ctrl+C or a fatal job error
    let outcome = run_until_stopped(&runner, config.flush_secs, fatal_rx).await;

    // 5. Graceful shutdown
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, scheduler.join_all())
        .await
        .is_err()
    {
        warn!("Collection jobs still running after grace period");
    }
    let closed = cache.close_all();
    executor.shutdown();

    info!(closed_connections = closed, "Shutdown complete.");

    if let Err(e) = &outcome {
        error!(error = %e, "Agent stopped on a fatal error");
    }
    outcome
}

async fn run_until_stopped(
    runner: &Arc<PluginRunner>,
    flush_secs: u32,
    mut fatal: ShutdownToken,
) -> Result<()> {
    let summary = runner
        .start(flush_secs)
        .await
        .context("Agent cannot start")?;
    info!(
        activated = summary.activated,
        not_ready = summary.not_ready,
        failed = summary.failed,
        "Initial plugin pass finished"
    );

    info!("Agent ready. Press Ctrl+C to shutdown");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received. Exiting gracefully...");
            Ok(())
        }
        _ = fatal.wait() => Err(anyhow!("Collection job reported a fatal configuration error")),
    }
}
