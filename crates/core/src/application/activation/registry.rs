// ActivationRegistry - the "activate once" set

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Server names whose collection job is already scheduled
///
/// Entries are never removed: a restarted service keeps its name and is not
/// activated again by this process.
#[derive(Debug, Default)]
pub struct ActivationRegistry {
    activated: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_activated(&self, server_name: &str) -> bool {
        self.activated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(server_name)
    }

    /// Record `server_name` as activated
    ///
    /// Returns false when the name is empty or was already present.
    pub fn mark_activated(&self, server_name: &str) -> bool {
        if server_name.is_empty() {
            return false;
        }
        let mut activated = self
            .activated
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if activated.contains_key(server_name) {
            return false;
        }
        activated.insert(server_name.to_string(), Utc::now());
        true
    }

    /// When `server_name` was activated
    pub fn activated_at(&self, server_name: &str) -> Option<DateTime<Utc>> {
        self.activated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_name)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.activated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
