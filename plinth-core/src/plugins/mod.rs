//! Plugin management for plinth
//!
//! This module provides the lifecycle side of the host:
//!
//! - [`PluginManager`]: Loads plugins in dependency order, enables and
//!   disables them, and routes events and registrations
//! - [`PluginRegistry`]: Loaded plugins by name, in load order
//! - [`ManifestLoader`]: Built-in loader for `*.plugin.toml` manifests
//! - [`PluginHostConfig`]: Plugin directory, update folder and timing settings
//! - [`PluginManagerError`]: Error types for manager operations
//!
//! # Update folder
//!
//! Before a plugin file is loaded, a file with the same name inside the
//! update folder (`<plugin dir>/update` unless configured otherwise) replaces
//! it and is then removed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use plinth_core::plugins::{ManifestLoader, PluginHostConfig, PluginManager};
//!
//! let config = PluginHostConfig::load(&PluginHostConfig::default_path())?;
//! let manager = PluginManager::new(config);
//! manager.register_interface(Arc::new(ManifestLoader::new()));
//!
//! for plugin in manager.load_all(&manager.config().plugin_dir.clone())? {
//!     manager.enable_plugin(&plugin);
//! }
//! ```

mod config;
mod error;
mod manager;
mod manifest;
mod registry;

pub use config::PluginHostConfig;
pub use error::PluginManagerError;
pub use manager::{HostSinks, PluginManager};
pub use manifest::ManifestLoader;
pub use registry::PluginRegistry;
