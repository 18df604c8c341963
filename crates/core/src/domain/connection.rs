// Connection cache identities and discovered processes

use serde::{Deserialize, Serialize};

/// A locally running process as seen by the process enumeration source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    /// OS-level display name (main class / command line)
    pub display_name: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, display_name: impl Into<String>) -> Self {
        Self {
            pid,
            display_name: display_name.into(),
        }
    }
}

/// Composite cache key: server name followed by process id
///
/// Ordering is (server_name, pid), so every key of one server name forms a
/// contiguous range that can be scanned by prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    server_name: String,
    pid: u32,
}

impl CacheKey {
    pub fn new(server_name: impl Into<String>, pid: u32) -> Self {
        Self {
            server_name: server_name.into(),
            pid,
        }
    }

    /// Lowest possible key for `server_name` (start of its prefix range)
    pub fn range_start(server_name: &str) -> Self {
        Self::new(server_name, u32::MIN)
    }

    /// Highest possible key for `server_name` (end of its prefix range)
    pub fn range_end(server_name: &str) -> Self {
        Self::new(server_name, u32::MAX)
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn belongs_to(&self, server_name: &str) -> bool {
        self.server_name == server_name
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.server_name, self.pid)
    }
}
