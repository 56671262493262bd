//! Plugin host configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::PluginManagerError;

/// Configuration for the plugin manager
///
/// Stored as TOML in `~/.config/plinth/config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginHostConfig {
    /// Directory scanned by `load_all` (~/.config/plinth/plugins)
    pub plugin_dir: PathBuf,
    /// Folder, relative to the plugin directory, holding replacement plugin
    /// files. `None` or an empty path disables updates.
    pub update_folder: Option<PathBuf>,
    /// Record call counts and durations for newly registered listeners
    pub use_timings: bool,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            plugin_dir: plinth_paths::plugin_dir(),
            update_folder: Some(PathBuf::from("update")),
            use_timings: false,
        }
    }
}

impl PluginHostConfig {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        plinth_paths::config_dir().join("config.toml")
    }

    /// Load configuration from a TOML file
    ///
    /// Returns the default configuration if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PluginManagerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PluginManagerError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), PluginManagerError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PluginManagerError::Config(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Update folder resolved against `directory`, if updates are enabled
    pub fn update_dir(&self, directory: &Path) -> Option<PathBuf> {
        self.update_folder
            .as_deref()
            .filter(|folder| !folder.as_os_str().is_empty())
            .map(|folder| directory.join(folder))
    }
}
