//! Built-in plugins: JMX connection collection and ping probing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use hostmon_core::application::constants::{PAYLOAD_JMX_SERVER_NAME, PAYLOAD_PLUGIN_NAME};
use hostmon_core::application::ConnectionCache;
use hostmon_core::domain::{JobPayload, PluginDescriptor, PreconditionContext};
use hostmon_core::port::{
    AddressDetector, CollectionJob, CommandExecutor, InMemoryPluginRegistry,
};
use hostmon_core::{AppError, Result};

use crate::config::AgentConfig;

const JMX_PLUGIN_NAME: &str = "jmx";
const PING_PLUGIN_NAME: &str = "ping";
const PING_SERVER_NAME: &str = "ping";
const PING_COUNT: u32 = 5;

/// Pulls the connection set of one JMX identifier on every run
///
/// Working directories are looked up once per pid and forgotten when the
/// pid leaves the connection set. Sessions whose peer went away are removed
/// from the cache.
pub struct JmxCollectionJob {
    cache: Arc<ConnectionCache>,
    commands: Arc<dyn CommandExecutor>,
    cmd_dirs: Mutex<HashMap<(String, u32), Option<String>>>,
}

impl JmxCollectionJob {
    pub fn new(cache: Arc<ConnectionCache>, commands: Arc<dyn CommandExecutor>) -> Self {
        Self {
            cache,
            commands,
            cmd_dirs: Mutex::new(HashMap::new()),
        }
    }

    fn cmd_dirs(&self) -> MutexGuard<'_, HashMap<(String, u32), Option<String>>> {
        self.cmd_dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn cmd_dir(&self, jmx_server_name: &str, pid: u32) -> Option<String> {
        let key = (jmx_server_name.to_string(), pid);
        if let Some(dir) = self.cmd_dirs().get(&key).cloned() {
            return dir;
        }

        let dir = self.commands.get_cmd_dir_by_pid(pid).await;
        self.cmd_dirs().insert(key, dir.clone());
        dir
    }

    fn retain_cmd_dirs(&self, jmx_server_name: &str, live: &HashSet<u32>) {
        self.cmd_dirs()
            .retain(|(server, pid), _| server != jmx_server_name || live.contains(pid));
    }

    #[cfg(test)]
    fn cached_cmd_dirs(&self) -> usize {
        self.cmd_dirs().len()
    }
}

#[async_trait]
impl CollectionJob for JmxCollectionJob {
    async fn run(&self, payload: &JobPayload) -> Result<()> {
        let jmx_server_name = payload
            .get_str(PAYLOAD_JMX_SERVER_NAME)
            .ok_or_else(|| {
                AppError::Validation(format!("payload has no {}", PAYLOAD_JMX_SERVER_NAME))
            })?;
        let plugin = payload.get_str(PAYLOAD_PLUGIN_NAME).unwrap_or(JMX_PLUGIN_NAME);

        let entries = self.cache.acquire_connections(jmx_server_name).await;
        let mut live = HashSet::with_capacity(entries.len());

        for entry in &entries {
            if !entry.handle.is_open() {
                warn!(
                    pid = entry.pid,
                    jmx_server_name = %jmx_server_name,
                    "Management session lost, dropping connection"
                );
                self.cache.remove_connection(jmx_server_name, entry.pid).await;
                continue;
            }
            live.insert(entry.pid);
            let cmd_dir = self.cmd_dir(jmx_server_name, entry.pid).await;
            debug!(
                pid = entry.pid,
                qualified_name = %entry.qualified_name,
                cmd_dir = cmd_dir.as_deref().unwrap_or("-"),
                "Collecting from connection"
            );
        }
        self.retain_cmd_dirs(jmx_server_name, &live);

        if live.is_empty() {
            warn!(
                plugin = %plugin,
                jmx_server_name = %jmx_server_name,
                "No management connections available"
            );
            return Ok(());
        }

        info!(
            plugin = %plugin,
            jmx_server_name = %jmx_server_name,
            connections = live.len(),
            expected = self.cache.expected_count(jmx_server_name),
            "JMX collection cycle finished"
        );
        Ok(())
    }
}

/// Pings every configured address on every run
pub struct PingCollectionJob {
    commands: Arc<dyn CommandExecutor>,
    addresses: Vec<String>,
}

impl PingCollectionJob {
    pub fn new(commands: Arc<dyn CommandExecutor>, addresses: Vec<String>) -> Self {
        Self {
            commands,
            addresses,
        }
    }
}

#[async_trait]
impl CollectionJob for PingCollectionJob {
    async fn run(&self, _payload: &JobPayload) -> Result<()> {
        for address in &self.addresses {
            let result = self.commands.ping(address, PING_COUNT).await;
            info!(
                address = %address,
                code = result.code.as_i32(),
                success_count = result.success_count,
                average_latency_ms = result.average_latency_ms,
                "Ping finished"
            );
        }
        Ok(())
    }
}

/// The agent has no address discovery of its own
struct NoAutoDetect;

#[async_trait]
impl AddressDetector for NoAutoDetect {
    async fn auto_detect(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Descriptors for the plugins enabled by configuration
pub fn build_registry(
    config: &AgentConfig,
    cache: Arc<ConnectionCache>,
    commands: Arc<dyn CommandExecutor>,
) -> InMemoryPluginRegistry {
    let mut plugins = Vec::new();

    if let Some(servers) = &config.jmx_servers {
        plugins.push(PluginDescriptor {
            plugin_name: JMX_PLUGIN_NAME.to_string(),
            server_name: servers.clone(),
            activation_policy: config.activation,
            poll_interval_secs: config.step_secs,
            context: PreconditionContext::Jmx {
                server_names: servers.clone(),
            },
            job: Arc::new(JmxCollectionJob::new(cache, Arc::clone(&commands))),
        });
    }

    if !config.ping_targets.is_empty() {
        plugins.push(PluginDescriptor {
            plugin_name: PING_PLUGIN_NAME.to_string(),
            server_name: PING_SERVER_NAME.to_string(),
            activation_policy: config.activation,
            poll_interval_secs: config.step_secs,
            context: PreconditionContext::Detect {
                addresses: config.ping_targets.clone(),
                detector: Arc::new(NoAutoDetect),
            },
            job: Arc::new(PingCollectionJob::new(commands, config.ping_targets.clone())),
        });
    }

    info!(plugins = plugins.len(), "Plugin registry built");
    InMemoryPluginRegistry::new(plugins)
}
