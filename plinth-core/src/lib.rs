//! plinth-core: Core library for the plinth plugin host
//!
//! This crate provides the host side of the plugin system:
//!
//! - **Load ordering** - [`DependencyGraph`] and [`sort`] turn a batch of
//!   descriptors into a dependency-respecting load order
//! - **Lifecycle** - [`PluginManager`] loads, enables and disables plugins
//! - **Events** - [`EventBus`] dispatches typed events to prioritized listeners
//! - **Permissions** - [`PermissionRegistry`] and [`SubscriptionIndex`] track
//!   permission definitions and who watches them
//! - **Commands** - [`CommandRegistry`] holds commands namespaced by plugin
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use plinth_core::{ManifestLoader, PluginHostConfig, PluginManager};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = PluginManager::new(PluginHostConfig::default());
//!     manager.register_interface(Arc::new(ManifestLoader::new()));
//!
//!     for plugin in manager.load_all(Path::new("plugins"))? {
//!         manager.enable_plugin(&plugin);
//!     }
//!
//!     manager.clear_plugins();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  PluginManager                    │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────┐ │
//! │  │LoaderRegistry│  │PluginRegistry│  │ EventBus │ │
//! │  └──────────────┘  └──────────────┘  └──────────┘ │
//! │  ┌──────────────────────────────┐  ┌────────────┐ │
//! │  │ PermissionRegistry           │  │ HostSinks  │ │
//! │  │   └── SubscriptionIndex      │  │            │ │
//! │  └──────────────────────────────┘  └────────────┘ │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod error;
pub mod events;
pub mod graph;
pub mod isolation;
pub mod loaders;
pub mod permissions;
pub mod plugins;

// Re-export key types for convenience
pub use commands::{CommandRegistry, RegisteredCommand};
pub use error::{EventBusError, PermissionError};
pub use events::{EventBus, HandlerList, ListenerTiming};
pub use graph::{DependencyGraph, LoadOrder, ResolveError, ResolvedPlugin, sort};
pub use loaders::LoaderRegistry;
pub use permissions::{PermissionRegistry, SubscriptionIndex};
pub use plugins::{
    HostSinks, ManifestLoader, PluginHostConfig, PluginManager, PluginManagerError,
    PluginRegistry,
};
