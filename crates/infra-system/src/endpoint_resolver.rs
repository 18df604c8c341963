// Endpoint resolver - management endpoint from JVM system properties
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use hostmon_core::port::{Credentials, EndpointResolver, ManagementEndpoint};

use crate::process_source_impl::CommandLineSource;

/// `-D` property carrying the remote management port
pub const REMOTE_PORT_PROPERTY: &str = "com.sun.management.jmxremote.port";

/// `-D` property switching on remote authentication
pub const AUTHENTICATE_PROPERTY: &str = "com.sun.management.jmxremote.authenticate";

/// Property holding the local connector address
pub const LOCAL_CONNECTOR_PROPERTY: &str = "com.sun.management.jmxremote.localConnectorAddress";

/// Resolves endpoints by reading `-Dkey=value` flags from the command line
pub struct CmdlineEndpointResolver {
    cmdlines: Arc<dyn CommandLineSource>,
    credentials: Option<Credentials>,
}

impl CmdlineEndpointResolver {
    /// `credentials` are attached to remote endpoints that require authentication
    pub fn new(cmdlines: Arc<dyn CommandLineSource>, credentials: Option<Credentials>) -> Self {
        Self {
            cmdlines,
            credentials,
        }
    }

    fn property(&self, pid: u32, key: &str) -> Option<String> {
        let cmdline = self.cmdlines.command_line(pid)?;
        property_value(&cmdline, key)
    }
}

/// Value of `key` given as `-Dkey=value` (or bare `key=value`)
fn property_value(args: &[String], key: &str) -> Option<String> {
    args.iter().find_map(|arg| {
        let arg = arg.strip_prefix("-D").unwrap_or(arg);
        let (k, v) = arg.split_once('=')?;
        (k == key && !v.is_empty()).then(|| v.to_string())
    })
}

/// Remote management URL for `host:port`
pub fn remote_url(host: &str, port: u16) -> String {
    format!("service:jmx:rmi:///jndi/rmi://{}:{}/jmxrmi", host, port)
}

#[async_trait]
impl EndpointResolver for CmdlineEndpointResolver {
    async fn local_attach(&self, pid: u32) -> Option<ManagementEndpoint> {
        let address = self.property(pid, LOCAL_CONNECTOR_PROPERTY)?;
        Some(ManagementEndpoint::LocalAttach { address })
    }

    async fn remote(&self, pid: u32, host: &str) -> Option<ManagementEndpoint> {
        let port = match self.property(pid, REMOTE_PORT_PROPERTY)?.parse::<u16>() {
            Ok(port) => port,
            Err(e) => {
                debug!(pid, error = %e, "Invalid remote management port");
                return None;
            }
        };

        let authenticate = self
            .property(pid, AUTHENTICATE_PROPERTY)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Some(ManagementEndpoint::Remote {
            url: remote_url(host, port),
            credentials: if authenticate {
                self.credentials.clone()
            } else {
                None
            },
        })
    }
}
