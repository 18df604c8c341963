// Management-protocol ports (endpoint resolution + connection)
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Connection errors (per process; never abort a batch)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("No management endpoint for pid {0}")]
    EndpointUnresolved(u32),

    #[error("Connect to {endpoint} timed out after {timeout_ms}ms")]
    ConnectTimeout { endpoint: String, timeout_ms: u64 },

    #[error("Connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Close failed: {0}")]
    CloseFailed(String),
}

/// User/password pair for authenticated endpoints
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Where to reach a process's management interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementEndpoint {
    /// Same-host attach address
    LocalAttach { address: String },
    /// Remote endpoint URL, optionally authenticated
    Remote {
        url: String,
        credentials: Option<Credentials>,
    },
}

impl ManagementEndpoint {
    pub fn address(&self) -> &str {
        match self {
            ManagementEndpoint::LocalAttach { address } => address,
            ManagementEndpoint::Remote { url, .. } => url,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            ManagementEndpoint::LocalAttach { .. } => None,
            ManagementEndpoint::Remote { credentials, .. } => credentials.as_ref(),
        }
    }
}

impl std::fmt::Display for ManagementEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.address())
    }
}

/// Resolves the management endpoint of a local process
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Local-attach endpoint, if the process exposes one
    async fn local_attach(&self, pid: u32) -> Option<ManagementEndpoint>;

    /// Remote endpoint reached through `host` (normally loopback)
    async fn remote(&self, pid: u32, host: &str) -> Option<ManagementEndpoint>;
}

/// Opaque live connection handle
pub trait ManagementConnection: Send + Sync {
    /// Release the underlying session
    fn close(&self) -> Result<(), ConnectionError>;

    /// Whether the handle still looks usable
    fn is_open(&self) -> bool;
}

/// Opens management-protocol connections
#[async_trait]
pub trait ManagementConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &ManagementEndpoint,
    ) -> Result<Arc<dyn ManagementConnection>, ConnectionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Resolves every pid to `mock://<host>/<pid>` unless told otherwise
    #[derive(Default)]
    pub struct MockEndpointResolver {
        local: Mutex<HashMap<u32, String>>,
        unresolvable: Mutex<HashSet<u32>>,
    }

    impl MockEndpointResolver {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn set_local(&self, pid: u32, address: &str) {
            self.local.lock().unwrap().insert(pid, address.to_string());
        }
        pub fn set_unresolvable(&self, pid: u32) {
            self.unresolvable.lock().unwrap().insert(pid);
        }
    }

    #[async_trait]
    impl EndpointResolver for MockEndpointResolver {
        async fn local_attach(&self, pid: u32) -> Option<ManagementEndpoint> {
            self.local
                .lock()
                .unwrap()
                .get(&pid)
                .map(|address| ManagementEndpoint::LocalAttach {
                    address: address.clone(),
                })
        }
        async fn remote(&self, pid: u32, host: &str) -> Option<ManagementEndpoint> {
            if self.unresolvable.lock().unwrap().contains(&pid) {
                return None;
            }
            Some(ManagementEndpoint::Remote {
                url: format!("mock://{}/{}", host, pid),
                credentials: None,
            })
        }
    }

    /// Handle that remembers whether it was closed
    #[derive(Default)]
    pub struct MockConnection {
        closed: AtomicBool,
        fail_close: bool,
    }

    impl MockConnection {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn failing_close() -> Self {
            Self {
                closed: AtomicBool::new(false),
                fail_close: true,
            }
        }
    }

    impl ManagementConnection for MockConnection {
        fn close(&self) -> Result<(), ConnectionError> {
            if self.fail_close {
                return Err(ConnectionError::CloseFailed("mock close failure".into()));
            }
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }
    }

    /// Connector that succeeds unless an endpoint is marked as failing
    #[derive(Default)]
    pub struct MockConnector {
        failing: Mutex<HashSet<String>>,
        delay: Mutex<Option<Duration>>,
        connects: AtomicUsize,
        endpoints: Mutex<Vec<ManagementEndpoint>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn fail_endpoint(&self, address: &str) {
            self.failing.lock().unwrap().insert(address.to_string());
        }
        pub fn heal_endpoint(&self, address: &str) {
            self.failing.lock().unwrap().remove(address);
        }
        /// Make every connect sleep before answering
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }
        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
        pub fn endpoints(&self) -> Vec<ManagementEndpoint> {
            self.endpoints.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ManagementConnector for MockConnector {
        async fn connect(
            &self,
            endpoint: &ManagementEndpoint,
        ) -> Result<Arc<dyn ManagementConnection>, ConnectionError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.endpoints.lock().unwrap().push(endpoint.clone());
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.lock().unwrap().contains(endpoint.address()) {
                return Err(ConnectionError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: "refused".into(),
                });
            }
            Ok(Arc::new(MockConnection::new()))
        }
    }
}
