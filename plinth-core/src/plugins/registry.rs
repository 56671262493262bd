//! Plugin registry - owns every loaded plugin

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use plinth_plugin_api::Plugin;

use super::error::PluginManagerError;

#[derive(Default)]
struct Table {
    plugins: Vec<Arc<Plugin>>,
    by_name: HashMap<String, Arc<Plugin>>,
}

/// Loaded plugins in load order, with lookup by name.
///
/// Names are case-sensitive and unique. A plugin stays here until the
/// registry is cleared.
#[derive(Default)]
pub struct PluginRegistry {
    table: RwLock<Table>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly loaded plugin
    pub fn insert(&self, plugin: Plugin) -> Result<Arc<Plugin>, PluginManagerError> {
        let mut table = self.table.write();
        if table.by_name.contains_key(plugin.name()) {
            return Err(PluginManagerError::DuplicatePlugin {
                name: plugin.name().to_string(),
            });
        }

        let plugin = Arc::new(plugin);
        table.plugins.push(Arc::clone(&plugin));
        table
            .by_name
            .insert(plugin.name().to_string(), Arc::clone(&plugin));
        Ok(plugin)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.table.read().by_name.get(name).cloned()
    }

    /// Whether this exact plugin instance is held by the registry
    pub fn contains(&self, plugin: &Arc<Plugin>) -> bool {
        self.table
            .read()
            .by_name
            .get(plugin.name())
            .is_some_and(|held| Arc::ptr_eq(held, plugin))
    }

    /// Snapshot of all plugins in load order
    pub fn all(&self) -> Vec<Arc<Plugin>> {
        self.table.read().plugins.clone()
    }

    pub fn len(&self) -> usize {
        self.table.read().plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().plugins.is_empty()
    }

    /// Drop every plugin, returning them in load order
    pub fn clear(&self) -> Vec<Arc<Plugin>> {
        let mut table = self.table.write();
        table.by_name.clear();
        std::mem::take(&mut table.plugins)
    }
}
