//! Loader registry - maps file-name patterns to plugin loaders

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use plinth_plugin_api::PluginLoader;

/// Registered loaders and the patterns each one claims.
///
/// A file is handled by the most recently registered loader with a pattern
/// that matches anywhere in the file name.
#[derive(Default)]
pub struct LoaderRegistry {
    entries: RwLock<Vec<(Regex, Arc<dyn PluginLoader>)>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every file filter of `loader`
    pub fn register(&self, loader: Arc<dyn PluginLoader>) {
        let filters = loader.file_filters();
        let mut entries = self.entries.write();
        for filter in filters {
            tracing::debug!(pattern = %filter, "Registered plugin loader pattern");
            entries.push((filter, Arc::clone(&loader)));
        }
    }

    /// Loader responsible for `file`, judged by its file name
    pub fn find(&self, file: &Path) -> Option<Arc<dyn PluginLoader>> {
        let name = file.file_name()?.to_string_lossy();
        self.entries
            .read()
            .iter()
            .rev()
            .find(|(filter, _)| filter.is_match(&name))
            .map(|(_, loader)| Arc::clone(loader))
    }

    /// Registered patterns, oldest first
    pub fn patterns(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|(filter, _)| filter.as_str().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
