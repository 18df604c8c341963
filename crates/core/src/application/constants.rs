// Agent constants (no magic values)
use std::time::Duration;

/// Bound on establishing one management-protocol connection (10s)
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Host used to build remote management endpoints for local processes
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Reserved activation identity of the discovery refresh job
pub const DISCOVERY_REFRESH_ID: &str = "AgentFlush";

/// Separator between several JMX display-name identifiers of one plugin
pub const JMX_SERVER_NAME_SEPARATOR: char = ',';

/// Payload keys handed to collection jobs
pub const PAYLOAD_PLUGIN_NAME: &str = "pluginName";
pub const PAYLOAD_JMX_SERVER_NAME: &str = "jmxServerName";
pub const PAYLOAD_SERVER_NAME: &str = "serverName";
