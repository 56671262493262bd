//! PluginLoader - the contract for format-specific plugin loaders

use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::event::{EventKey, Listener, RegisteredListener};
use crate::plugin::Plugin;

/// Materializes plugins from files of one format and drives their lifecycle
/// hooks.
///
/// Loaders are registered with the host, which selects one per file by
/// matching the file name against [`PluginLoader::file_filters`].
pub trait PluginLoader: Send + Sync {
    /// File-name patterns this loader understands
    fn file_filters(&self) -> Vec<Regex>;

    /// Read the descriptor from `file` without materializing the plugin
    fn describe(&self, file: &Path) -> Result<PluginDescriptor, PluginError>;

    /// Materialize the plugin in `file`. The returned plugin is disabled.
    fn load(self: Arc<Self>, file: &Path) -> Result<Plugin, PluginError>;

    /// Enable `plugin`. Responsible for setting its enabled flag.
    fn enable(&self, plugin: &Arc<Plugin>) -> Result<(), PluginError>;

    /// Disable `plugin`. Responsible for clearing its enabled flag.
    fn disable(&self, plugin: &Arc<Plugin>) -> Result<(), PluginError>;

    /// Bind the handlers of `listener` to `plugin`, grouped by event type in
    /// declaration order.
    fn create_registered_listeners(
        &self,
        listener: Arc<dyn Listener>,
        plugin: &Arc<Plugin>,
        timed: bool,
    ) -> Vec<(EventKey, Vec<RegisteredListener>)> {
        let mut grouped: Vec<(EventKey, Vec<RegisteredListener>)> = Vec::new();

        for spec in Arc::clone(&listener).handlers() {
            let mut registered = RegisteredListener::new(
                Arc::clone(&listener),
                spec.executor,
                spec.priority,
                Arc::clone(plugin),
                spec.ignore_cancelled,
            );
            if timed {
                registered = registered.timed();
            }

            match grouped.iter_mut().find(|(key, _)| *key == spec.event) {
                Some((_, group)) => group.push(registered),
                None => grouped.push((spec.event, vec![registered])),
            }
        }

        grouped
    }
}
