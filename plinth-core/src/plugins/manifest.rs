//! ManifestLoader - loads plugins described by `*.plugin.toml` files
//!
//! The manifest carries the descriptor. Behaviour comes from a factory the
//! host registers under the plugin's name; a manifest with no factory
//! becomes a plugin that only contributes its declared commands and
//! permissions.
//!
//! ```toml
//! name = "Greeter"
//! version = "1.2.0"
//! authors = ["ada"]
//! depend = ["Core"]
//! soft_depend = ["Chat"]
//!
//! [[commands]]
//! path = ["hello"]
//! description = "Say hello"
//!
//! [[permissions]]
//! name = "greeter.hello"
//! default = "true"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;

use plinth_plugin_api::{Plugin, PluginDescriptor, PluginError, PluginLoader, PluginMain};

static MANIFEST_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.plugin\.toml$").expect("manifest filter is a valid regex"));

type Factory = Arc<dyn Fn() -> Box<dyn PluginMain> + Send + Sync>;

/// Loader for TOML plugin manifests
#[derive(Default)]
pub struct ManifestLoader {
    factories: RwLock<HashMap<String, Factory>>,
}

impl ManifestLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the behaviour for the plugin named `name`
    pub fn register_factory<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn PluginMain> + Send + Sync + 'static,
    {
        self.factories.write().insert(name.into(), Arc::new(factory));
    }

    pub fn has_factory(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }
}

impl PluginLoader for ManifestLoader {
    fn file_filters(&self) -> Vec<Regex> {
        vec![MANIFEST_FILTER.clone()]
    }

    fn describe(&self, file: &Path) -> Result<PluginDescriptor, PluginError> {
        let content = std::fs::read_to_string(file)
            .map_err(|e| PluginError::invalid_description(file, e.to_string()))?;
        let descriptor = PluginDescriptor::from_toml(&content)
            .map_err(|e| PluginError::invalid_description(file, e.to_string()))?;
        descriptor
            .validate()
            .map_err(|reason| PluginError::invalid_description(file, reason))?;
        Ok(descriptor)
    }

    fn load(self: Arc<Self>, file: &Path) -> Result<Plugin, PluginError> {
        if !file.is_file() {
            return Err(PluginError::invalid_plugin(file, "file does not exist"));
        }
        let descriptor = self.describe(file)?;

        let factory = self.factories.read().get(&descriptor.name).cloned();
        let main: Box<dyn PluginMain> = match factory {
            Some(factory) => factory(),
            None => {
                tracing::debug!(plugin = %descriptor.name, "No factory registered, loading manifest only");
                Box::new(())
            }
        };

        Ok(Plugin::new(descriptor, file, self, main))
    }

    fn enable(&self, plugin: &Arc<Plugin>) -> Result<(), PluginError> {
        if plugin.is_enabled() {
            return Ok(());
        }
        tracing::info!(plugin = %plugin, "Enabling plugin");
        plugin.set_enabled(true);
        plugin.with_main(|main| main.on_enable(plugin))
    }

    fn disable(&self, plugin: &Arc<Plugin>) -> Result<(), PluginError> {
        if !plugin.is_enabled() {
            return Ok(());
        }
        tracing::info!(plugin = %plugin, "Disabling plugin");
        plugin.set_enabled(false);
        plugin.with_main(|main| main.on_disable(plugin))
    }
}
