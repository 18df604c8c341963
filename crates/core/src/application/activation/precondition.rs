//! Category-specific activation preconditions
//!
//! Every failure inside a check collapses into "not ready yet": the check
//! returns false and the next discovery cycle tries again.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::port::{AddressDetector, DatabaseProbe, ProcessMatcher, ProcessSource, SnmpSessionProbe};

/// Gate evaluated before an AUTO activation
#[async_trait]
pub trait Precondition: Send + Sync {
    /// Whether the monitored service is reachable now
    async fn check(&self) -> bool;

    /// Whether a FORCE activation has the configuration it needs
    fn force_allowed(&self) -> bool {
        true
    }
}

/// JMX: some local process display name matches the identifier
pub struct JmxPrecondition {
    processes: Arc<dyn ProcessSource>,
    matcher: Arc<dyn ProcessMatcher>,
    jmx_server_name: String,
}

impl JmxPrecondition {
    pub fn new(
        processes: Arc<dyn ProcessSource>,
        matcher: Arc<dyn ProcessMatcher>,
        jmx_server_name: impl Into<String>,
    ) -> Self {
        Self {
            processes,
            matcher,
            jmx_server_name: jmx_server_name.into(),
        }
    }
}

#[async_trait]
impl Precondition for JmxPrecondition {
    async fn check(&self) -> bool {
        if self.jmx_server_name.is_empty() {
            return false;
        }
        let found = self
            .processes
            .list_processes()
            .await
            .iter()
            .any(|p| self.matcher.matches(&self.jmx_server_name, &p.display_name));
        debug!(jmx_server_name = %self.jmx_server_name, found, "JMX precondition evaluated");
        found
    }
}

/// JDBC: at least one real connection can be opened
pub struct JdbcPrecondition {
    jdbc_config: String,
    probe: Arc<dyn DatabaseProbe>,
}

impl JdbcPrecondition {
    pub fn new(jdbc_config: impl Into<String>, probe: Arc<dyn DatabaseProbe>) -> Self {
        Self {
            jdbc_config: jdbc_config.into(),
            probe,
        }
    }
}

#[async_trait]
impl Precondition for JdbcPrecondition {
    async fn check(&self) -> bool {
        match self.probe.open_connections().await {
            Ok(count) => count > 0,
            Err(reason) => {
                debug!(reason = %reason, "JDBC precondition not met");
                false
            }
        }
    }

    fn force_allowed(&self) -> bool {
        !self.jdbc_config.is_empty()
    }
}

/// SNMP: session negotiation yields a usable session
pub struct SnmpPrecondition {
    credentials: Vec<String>,
    probe: Arc<dyn SnmpSessionProbe>,
}

impl SnmpPrecondition {
    pub fn new(credentials: Vec<String>, probe: Arc<dyn SnmpSessionProbe>) -> Self {
        Self { credentials, probe }
    }
}

#[async_trait]
impl Precondition for SnmpPrecondition {
    async fn check(&self) -> bool {
        match self.probe.negotiate_sessions().await {
            Ok(count) => count > 0,
            Err(reason) => {
                debug!(reason = %reason, "SNMP precondition not met");
                false
            }
        }
    }

    fn force_allowed(&self) -> bool {
        !self.credentials.is_empty()
    }
}

/// DETECT: configured addresses, else auto-detected ones
pub struct DetectPrecondition {
    addresses: Vec<String>,
    detector: Arc<dyn AddressDetector>,
}

impl DetectPrecondition {
    pub fn new(addresses: Vec<String>, detector: Arc<dyn AddressDetector>) -> Self {
        Self {
            addresses,
            detector,
        }
    }
}

#[async_trait]
impl Precondition for DetectPrecondition {
    async fn check(&self) -> bool {
        if !self.addresses.is_empty() {
            return true;
        }
        !self.detector.auto_detect().await.is_empty()
    }
}

/// Always satisfied
pub struct AlwaysReady;

#[async_trait]
impl Precondition for AlwaysReady {
    async fn check(&self) -> bool {
        true
    }
}
