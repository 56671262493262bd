//! Plugin manager error types

use std::path::PathBuf;
use thiserror::Error;

use plinth_plugin_api::PluginError;

use crate::error::{EventBusError, PermissionError};

/// Errors returned synchronously by the plugin manager
#[derive(Error, Debug)]
pub enum PluginManagerError {
    /// A disabled plugin tried to register a listener or command
    #[error("Plugin attempted to {action} while not enabled: {plugin}")]
    IllegalAccess { plugin: String, action: String },

    /// `load_all` was pointed at something that is not a directory
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A second plugin claimed an already registered name
    #[error("A plugin named '{name}' is already loaded")]
    DuplicatePlugin { name: String },

    /// The loader failed to materialize the plugin
    #[error("Could not load '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: PluginError,
    },

    /// A host sink rejected a registration
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    /// Configuration file could not be read or written
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginManagerError {
    pub(crate) fn illegal_access(plugin: &str, action: &str) -> Self {
        Self::IllegalAccess {
            plugin: plugin.to_string(),
            action: action.to_string(),
        }
    }
}
