// Plugin registry port
//
// Plugin loading is an external concern; the core only reads descriptors.

use crate::domain::{PluginCategory, PluginDescriptor};

/// Supplies plugin descriptors per category
pub trait PluginRegistry: Send + Sync {
    fn plugins(&self, category: PluginCategory) -> Vec<PluginDescriptor>;
}

/// Registry backed by a fixed list built at startup
#[derive(Default, Clone)]
pub struct InMemoryPluginRegistry {
    plugins: Vec<PluginDescriptor>,
}

impl InMemoryPluginRegistry {
    pub fn new(plugins: Vec<PluginDescriptor>) -> Self {
        Self { plugins }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl PluginRegistry for InMemoryPluginRegistry {
    fn plugins(&self, category: PluginCategory) -> Vec<PluginDescriptor> {
        self.plugins
            .iter()
            .filter(|p| p.category() == category)
            .cloned()
            .collect()
    }
}
