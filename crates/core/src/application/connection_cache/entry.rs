// Cached connection for one (server name, pid) pair

use std::sync::Arc;

use crate::domain::CacheKey;
use crate::port::ManagementConnection;

/// Live management connection owned by ConnectionCache
#[derive(Clone)]
pub struct ConnectionCacheEntry {
    pub key: CacheKey,
    pub server_name: String,
    /// OS-level process display name
    pub qualified_name: String,
    pub handle: Arc<dyn ManagementConnection>,
    pub valid: bool,
    pub pid: u32,
}

impl std::fmt::Debug for ConnectionCacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCacheEntry")
            .field("key", &self.key.to_string())
            .field("qualified_name", &self.qualified_name)
            .field("valid", &self.valid)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}
