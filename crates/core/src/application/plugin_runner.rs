// Plugin Runner - walks the plugin registry and activates every plugin instance

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::activation::{
    ActivationController, ActivationRequest, ActivationState, DetectPrecondition,
    JdbcPrecondition, JmxPrecondition, Precondition, SnmpPrecondition,
};
use crate::application::constants::{
    JMX_SERVER_NAME_SEPARATOR, PAYLOAD_JMX_SERVER_NAME, PAYLOAD_PLUGIN_NAME, PAYLOAD_SERVER_NAME,
};
use crate::domain::{JobPayload, PluginCategory, PluginDescriptor, PreconditionContext};
use crate::error::Result;
use crate::port::{CollectionJob, PluginRegistry, ProcessMatcher, ProcessSource};

/// Tally of one pass over the registry
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub activated: usize,
    pub already_activated: usize,
    pub not_ready: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, state: ActivationState) {
        match state {
            ActivationState::Activated => self.activated += 1,
            ActivationState::AlreadyActivated => self.already_activated += 1,
            ActivationState::PreconditionNotMet => self.not_ready += 1,
            ActivationState::Failed => self.failed += 1,
        }
    }
}

/// Orchestrates activation of every registered plugin
pub struct PluginRunner {
    plugins: Arc<dyn PluginRegistry>,
    controller: Arc<ActivationController>,
    processes: Arc<dyn ProcessSource>,
    matcher: Arc<dyn ProcessMatcher>,
}

impl PluginRunner {
    pub fn new(
        plugins: Arc<dyn PluginRegistry>,
        controller: Arc<ActivationController>,
        processes: Arc<dyn ProcessSource>,
        matcher: Arc<dyn ProcessMatcher>,
    ) -> Self {
        Self {
            plugins,
            controller,
            processes,
            matcher,
        }
    }

    /// Schedule the discovery refresh job, then run one pass
    pub async fn start(self: &Arc<Self>, refresh_interval_secs: u32) -> Result<RunSummary> {
        let refresh: Arc<dyn CollectionJob> = Arc::new(DiscoveryRefreshJob::new(Arc::clone(self)));
        self.controller
            .activate_discovery_refresh(refresh_interval_secs, refresh)
            .await?;
        self.run().await
    }

    /// One pass over every plugin category
    ///
    /// A failing plugin never stops the pass; only fatal configuration
    /// errors are returned.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for plugin in self.plugins.plugins(PluginCategory::Jmx) {
            for request in self.jmx_requests(&plugin) {
                self.submit(request, &mut summary).await?;
            }
        }
        for category in [PluginCategory::Snmp, PluginCategory::Detect, PluginCategory::Jdbc] {
            for plugin in self.plugins.plugins(category) {
                match self.single_request(&plugin) {
                    Some(request) => self.submit(request, &mut summary).await?,
                    None => {
                        warn!(plugin = %plugin.plugin_name, "Plugin has no server name, skipped");
                        summary.skipped += 1;
                    }
                }
            }
        }

        debug!(?summary, "Plugin pass finished");
        Ok(summary)
    }

    async fn submit(&self, request: ActivationRequest, summary: &mut RunSummary) -> Result<()> {
        let plugin_name = request.plugin_name.clone();
        match self.controller.activate(request).await {
            Ok(state) => summary.record(state),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(plugin = %plugin_name, error = %e, "Plugin activation failed");
                summary.failed += 1;
            }
        }
        Ok(())
    }

    /// One request per non-empty JMX identifier
    fn jmx_requests(&self, plugin: &PluginDescriptor) -> Vec<ActivationRequest> {
        let PreconditionContext::Jmx { server_names } = &plugin.context else {
            return Vec::new();
        };

        server_names
            .split(JMX_SERVER_NAME_SEPARATOR)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|jmx_server_name| {
                let plugin_name = format!("{}-{}", plugin.plugin_name, jmx_server_name);
                let payload = JobPayload::new()
                    .with(PAYLOAD_PLUGIN_NAME, plugin_name.clone())
                    .with(PAYLOAD_JMX_SERVER_NAME, jmx_server_name)
                    .with(PAYLOAD_SERVER_NAME, plugin.server_name.clone());
                ActivationRequest {
                    server_name: jmx_server_name.to_string(),
                    description: plugin_name.clone(),
                    plugin_name,
                    category: PluginCategory::Jmx,
                    policy: plugin.activation_policy,
                    poll_interval_secs: plugin.poll_interval_secs,
                    precondition: Arc::new(JmxPrecondition::new(
                        Arc::clone(&self.processes),
                        Arc::clone(&self.matcher),
                        jmx_server_name,
                    )),
                    payload,
                    job: Arc::clone(&plugin.job),
                }
            })
            .collect()
    }

    /// Request for SNMP, DETECT and JDBC plugins
    fn single_request(&self, plugin: &PluginDescriptor) -> Option<ActivationRequest> {
        if plugin.server_name.is_empty() {
            return None;
        }

        // JDBC and SNMP register under "{plugin}-{server}" but name their job after the server
        let (server_name, plugin_name, description, precondition): (
            String,
            String,
            String,
            Arc<dyn Precondition>,
        ) = match &plugin.context {
            PreconditionContext::Jmx { .. } => return None,
            PreconditionContext::Jdbc { jdbc_config, probe } => {
                let name = format!("{}-{}", plugin.plugin_name, plugin.server_name);
                let pre = JdbcPrecondition::new(jdbc_config.clone(), Arc::clone(probe));
                (name.clone(), name, plugin.server_name.clone(), Arc::new(pre))
            }
            PreconditionContext::Snmp { credentials, probe } => {
                let name = format!("{}-{}", plugin.plugin_name, plugin.server_name);
                let pre = SnmpPrecondition::new(credentials.clone(), Arc::clone(probe));
                (name.clone(), name, plugin.server_name.clone(), Arc::new(pre))
            }
            PreconditionContext::Detect {
                addresses,
                detector,
            } => {
                let pre = DetectPrecondition::new(addresses.clone(), Arc::clone(detector));
                (
                    plugin.server_name.clone(),
                    plugin.plugin_name.clone(),
                    plugin.plugin_name.clone(),
                    Arc::new(pre),
                )
            }
        };

        let payload = JobPayload::new()
            .with(PAYLOAD_PLUGIN_NAME, plugin_name.clone())
            .with(PAYLOAD_SERVER_NAME, plugin.server_name.clone());

        Some(ActivationRequest {
            server_name,
            description,
            plugin_name,
            category: plugin.category(),
            policy: plugin.activation_policy,
            poll_interval_secs: plugin.poll_interval_secs,
            precondition,
            payload,
            job: Arc::clone(&plugin.job),
        })
    }
}

/// Scheduled job that re-runs discovery so late-starting services get picked up
pub struct DiscoveryRefreshJob {
    runner: Arc<PluginRunner>,
}

impl DiscoveryRefreshJob {
    pub fn new(runner: Arc<PluginRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl CollectionJob for DiscoveryRefreshJob {
    async fn run(&self, _payload: &JobPayload) -> Result<()> {
        let summary = self.runner.run().await?;
        if summary.activated > 0 {
            info!(activated = summary.activated, "Discovery refresh activated new services");
        }
        Ok(())
    }
}
