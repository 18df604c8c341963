//! Connection cache for management-protocol connections
//!
//! Keeps one connection per (server name, pid) and rebuilds the set for a
//! server name when the number of live matching processes drifts away from
//! the number of cached connections.
//!
//! Operations on one server name are serialized; different server names
//! never wait on each other.

mod close_registry;
mod entry;

pub use close_registry::CloseRegistry;
pub use entry::ConnectionCacheEntry;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::application::constants::{CONNECT_TIMEOUT, LOOPBACK_HOST};
use crate::domain::{CacheKey, ProcessInfo};
use crate::port::{
    ConnectionError, EndpointResolver, ManagementConnector, ManagementEndpoint, ProcessMatcher,
    ProcessSource,
};

/// Connection cache settings
#[derive(Debug, Clone)]
pub struct ConnectionCacheConfig {
    /// Prefer same-host attach endpoints over loopback remote ones
    pub local_attach: bool,
    pub connect_timeout: Duration,
    pub loopback_host: String,
}

impl Default for ConnectionCacheConfig {
    fn default() -> Self {
        Self {
            local_attach: false,
            connect_timeout: CONNECT_TIMEOUT,
            loopback_host: LOOPBACK_HOST.to_string(),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<CacheKey, ConnectionCacheEntry>,
    expected: HashMap<String, usize>,
}

impl CacheState {
    fn entries_for(&self, server_name: &str) -> Vec<ConnectionCacheEntry> {
        self.entries
            .range(CacheKey::range_start(server_name)..=CacheKey::range_end(server_name))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    fn drop_entries_for(&mut self, server_name: &str) -> usize {
        let keys: Vec<CacheKey> = self
            .entries
            .range(CacheKey::range_start(server_name)..=CacheKey::range_end(server_name))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }
}

/// Process-wide cache of management connections
pub struct ConnectionCache {
    processes: Arc<dyn ProcessSource>,
    matcher: Arc<dyn ProcessMatcher>,
    resolver: Arc<dyn EndpointResolver>,
    connector: Arc<dyn ManagementConnector>,
    config: ConnectionCacheConfig,
    state: Mutex<CacheState>,
    service_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    close_registry: CloseRegistry,
}

impl ConnectionCache {
    pub fn new(
        processes: Arc<dyn ProcessSource>,
        matcher: Arc<dyn ProcessMatcher>,
        resolver: Arc<dyn EndpointResolver>,
        connector: Arc<dyn ManagementConnector>,
        config: ConnectionCacheConfig,
    ) -> Self {
        Self {
            processes,
            matcher,
            resolver,
            connector,
            config,
            state: Mutex::new(CacheState::default()),
            service_locks: Mutex::new(HashMap::new()),
            close_registry: CloseRegistry::new(),
        }
    }

    /// Connections for `server_name`
    ///
    /// Connects to every matching process when nothing is cached. When the
    /// cached count differs from the live count the cache is rebuilt, but
    /// this call still returns the entries cached before the rebuild.
    pub async fn acquire_connections(&self, server_name: &str) -> Vec<ConnectionCacheEntry> {
        if server_name.is_empty() {
            error!("Server name for connection lookup must not be empty");
            return Vec::new();
        }
        let lock = self.service_lock(server_name);
        let _guard = lock.lock().await;

        let matching = self.matching_processes(server_name).await;
        let cached = self.state().entries_for(server_name);

        if cached.is_empty() {
            let established = self.connect_all(server_name, &matching).await;
            if !established.is_empty() {
                self.state()
                    .expected
                    .insert(server_name.to_string(), established.len());
            }
            return established;
        }

        if cached.len() != matching.len() {
            warn!(
                server_name = %server_name,
                cached = cached.len(),
                live = matching.len(),
                "Connection count drifted from live processes, resetting"
            );
            self.reset_locked(server_name).await;
        }

        cached
    }

    /// Rebuild every connection of `server_name`
    ///
    /// Skipped when fewer processes match than the last expected count, so a
    /// transient under-count does not tear down a healthy set. Returns
    /// whether the rebuild ran.
    pub async fn reset_connections(&self, server_name: &str) -> bool {
        if server_name.is_empty() {
            error!("Server name for connection reset must not be empty");
            return false;
        }
        let lock = self.service_lock(server_name);
        let _guard = lock.lock().await;
        self.reset_locked(server_name).await
    }

    /// Remove the connection for one process
    ///
    /// The handle stays in the close registry until `close_all`.
    pub async fn remove_connection(&self, server_name: &str, pid: u32) -> bool {
        let lock = self.service_lock(server_name);
        let _guard = lock.lock().await;

        let mut state = self.state();
        if state.entries.remove(&CacheKey::new(server_name, pid)).is_none() {
            return false;
        }
        if let Some(expected) = state.expected.get_mut(server_name) {
            *expected = expected.saturating_sub(1);
        }
        info!(server_name = %server_name, pid, "Removed management connection");
        true
    }

    /// Last recorded live process count for `server_name` (0 if never seen)
    pub fn expected_count(&self, server_name: &str) -> usize {
        self.state()
            .expected
            .get(server_name)
            .copied()
            .unwrap_or(0)
    }

    /// Number of cached connections for `server_name`
    pub fn cached_count(&self, server_name: &str) -> usize {
        self.state().entries_for(server_name).len()
    }

    /// Handles waiting in the close registry
    pub fn pending_close_count(&self) -> usize {
        self.close_registry.len()
    }

    /// Close every handle ever opened; used at agent shutdown
    pub fn close_all(&self) -> usize {
        let closed = self.close_registry.close_all();
        info!(closed, "Management connections closed");
        closed
    }

    async fn reset_locked(&self, server_name: &str) -> bool {
        let matching = self.matching_processes(server_name).await;
        let expected = self.expected_count(server_name);
        if matching.len() < expected {
            warn!(
                server_name = %server_name,
                live = matching.len(),
                expected,
                "Fewer live processes than expected, keeping current connections"
            );
            return false;
        }

        let dropped = self.state().drop_entries_for(server_name);
        debug!(server_name = %server_name, dropped, "Dropped cached connections");

        let rebuilt = self.connect_all(server_name, &matching).await;
        self.state()
            .expected
            .insert(server_name.to_string(), rebuilt.len());
        info!(
            server_name = %server_name,
            rebuilt = rebuilt.len(),
            "Connections rebuilt, effective from next collection"
        );
        true
    }

    /// Connect to every process, caching each success
    async fn connect_all(
        &self,
        server_name: &str,
        processes: &[ProcessInfo],
    ) -> Vec<ConnectionCacheEntry> {
        let mut established = Vec::with_capacity(processes.len());
        for process in processes {
            match self.connect_one(server_name, process).await {
                Ok(entry) => {
                    debug!(server_name = %server_name, pid = process.pid, "Management connection established");
                    self.state()
                        .entries
                        .insert(entry.key.clone(), entry.clone());
                    established.push(entry);
                }
                Err(e) => {
                    error!(
                        server_name = %server_name,
                        process = %process.display_name,
                        pid = process.pid,
                        error = %e,
                        "Management connection failed"
                    );
                }
            }
        }
        established
    }

    async fn connect_one(
        &self,
        server_name: &str,
        process: &ProcessInfo,
    ) -> Result<ConnectionCacheEntry, ConnectionError> {
        let endpoint = self
            .resolve_endpoint(process.pid)
            .await
            .ok_or(ConnectionError::EndpointUnresolved(process.pid))?;

        let handle = tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(&endpoint),
        )
        .await
        .map_err(|_| ConnectionError::ConnectTimeout {
            endpoint: endpoint.to_string(),
            timeout_ms: self.config.connect_timeout.as_millis() as u64,
        })??;

        self.close_registry.register(Arc::clone(&handle));

        Ok(ConnectionCacheEntry {
            key: CacheKey::new(server_name, process.pid),
            server_name: server_name.to_string(),
            qualified_name: process.display_name.clone(),
            handle,
            valid: true,
            pid: process.pid,
        })
    }

    async fn resolve_endpoint(&self, pid: u32) -> Option<ManagementEndpoint> {
        if self.config.local_attach {
            if let Some(endpoint) = self.resolver.local_attach(pid).await {
                return Some(endpoint);
            }
        }

        let remote = self.resolver.remote(pid, &self.config.loopback_host).await;
        match &remote {
            Some(endpoint) => debug!(pid, endpoint = %endpoint, "Resolved remote management endpoint"),
            None if !self.config.local_attach => {
                warn!(pid, "Process has no remote management endpoint configured")
            }
            None => {}
        }
        remote
    }

    async fn matching_processes(&self, server_name: &str) -> Vec<ProcessInfo> {
        self.processes
            .list_processes()
            .await
            .into_iter()
            .filter(|p| self.matcher.matches(server_name, &p.display_name))
            .collect()
    }

    fn service_lock(&self, server_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .service_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(server_name.to_string()).or_default())
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
