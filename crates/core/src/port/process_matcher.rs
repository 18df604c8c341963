// Process matching strategies used to map a server name onto running processes

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Decides whether a process display name belongs to a server name
pub trait ProcessMatcher: Send + Sync {
    fn matches(&self, server_name: &str, display_name: &str) -> bool;
}

/// Display name contains the server name (default discovery rule)
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl ProcessMatcher for SubstringMatcher {
    fn matches(&self, server_name: &str, display_name: &str) -> bool {
        !server_name.is_empty() && display_name.contains(server_name)
    }
}

/// Display name equals the server name
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl ProcessMatcher for ExactMatcher {
    fn matches(&self, server_name: &str, display_name: &str) -> bool {
        display_name == server_name
    }
}

/// Server name is a regular expression matched against the display name
///
/// Patterns are compiled on first use and cached per server name. A server
/// name that is not a valid pattern matches nothing.
#[derive(Debug, Default)]
pub struct RegexMatcher {
    compiled: Mutex<HashMap<String, Option<Regex>>>,
}

impl RegexMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessMatcher for RegexMatcher {
    fn matches(&self, server_name: &str, display_name: &str) -> bool {
        if server_name.is_empty() {
            return false;
        }
        let mut compiled = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        let pattern = compiled
            .entry(server_name.to_string())
            .or_insert_with(|| match Regex::new(server_name) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(server_name = %server_name, error = %e, "Invalid process pattern");
                    None
                }
            });
        pattern.as_ref().is_some_and(|re| re.is_match(display_name))
    }
}
