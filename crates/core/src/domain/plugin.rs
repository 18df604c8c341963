// Plugin descriptors supplied by the plugin registry

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::port::{AddressDetector, CollectionJob, DatabaseProbe, SnmpSessionProbe};

/// How a plugin decides to start collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationPolicy {
    /// Start only once the category precondition holds
    Auto,
    /// Start unconditionally (subject to the category's configuration check)
    Force,
}

impl std::str::FromStr for ActivationPolicy {
    type Err = super::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(ActivationPolicy::Auto),
            "FORCE" => Ok(ActivationPolicy::Force),
            other => Err(super::DomainError::ValidationError(format!(
                "unknown activation policy '{}'",
                other
            ))),
        }
    }
}

/// Plugin category; activations are serialized per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginCategory {
    Jmx,
    Jdbc,
    Snmp,
    Detect,
}

impl PluginCategory {
    pub const ALL: [PluginCategory; 4] = [
        PluginCategory::Jmx,
        PluginCategory::Jdbc,
        PluginCategory::Snmp,
        PluginCategory::Detect,
    ];

    /// Dense index, used for per-category lock slots
    pub fn index(self) -> usize {
        match self {
            PluginCategory::Jmx => 0,
            PluginCategory::Jdbc => 1,
            PluginCategory::Snmp => 2,
            PluginCategory::Detect => 3,
        }
    }
}

impl std::fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginCategory::Jmx => write!(f, "JMX"),
            PluginCategory::Jdbc => write!(f, "JDBC"),
            PluginCategory::Snmp => write!(f, "SNMP"),
            PluginCategory::Detect => write!(f, "DETECT"),
        }
    }
}

/// Category-specific inputs to the activation precondition
#[derive(Clone)]
pub enum PreconditionContext {
    /// Comma-separated display-name identifiers of the managed processes
    Jmx { server_names: String },
    Jdbc {
        jdbc_config: String,
        probe: Arc<dyn DatabaseProbe>,
    },
    Snmp {
        credentials: Vec<String>,
        probe: Arc<dyn SnmpSessionProbe>,
    },
    Detect {
        addresses: Vec<String>,
        detector: Arc<dyn AddressDetector>,
    },
}

impl PreconditionContext {
    pub fn category(&self) -> PluginCategory {
        match self {
            PreconditionContext::Jmx { .. } => PluginCategory::Jmx,
            PreconditionContext::Jdbc { .. } => PluginCategory::Jdbc,
            PreconditionContext::Snmp { .. } => PluginCategory::Snmp,
            PreconditionContext::Detect { .. } => PluginCategory::Detect,
        }
    }
}

impl std::fmt::Debug for PreconditionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreconditionContext::Jmx { server_names } => f
                .debug_struct("Jmx")
                .field("server_names", server_names)
                .finish(),
            PreconditionContext::Jdbc { jdbc_config, .. } => f
                .debug_struct("Jdbc")
                .field("jdbc_config", &!jdbc_config.is_empty())
                .finish_non_exhaustive(),
            PreconditionContext::Snmp { credentials, .. } => f
                .debug_struct("Snmp")
                .field("credentials", &credentials.len())
                .finish_non_exhaustive(),
            PreconditionContext::Detect { addresses, .. } => f
                .debug_struct("Detect")
                .field("addresses", addresses)
                .finish_non_exhaustive(),
        }
    }
}

/// One plugin instance, immutable for the lifetime of a run
#[derive(Clone)]
pub struct PluginDescriptor {
    pub plugin_name: String,
    pub server_name: String,
    pub activation_policy: ActivationPolicy,
    pub poll_interval_secs: u32,
    pub context: PreconditionContext,
    /// Collection callback the scheduler invokes every period
    pub job: Arc<dyn CollectionJob>,
}

impl PluginDescriptor {
    pub fn category(&self) -> PluginCategory {
        self.context.category()
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("plugin_name", &self.plugin_name)
            .field("server_name", &self.server_name)
            .field("activation_policy", &self.activation_policy)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
