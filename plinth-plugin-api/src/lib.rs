//! plinth-plugin-api - Plugin API for the plinth plugin host
//!
//! This crate holds everything plugin authors and loader authors link
//! against: descriptors, the [`Plugin`] handle, the [`PluginLoader`] trait,
//! events and listeners, permission definitions, and the host sinks the
//! plugin manager drives during teardown.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use plinth_plugin_api::{Event, EventPriority, HandlerSpec, Listener};
//!
//! struct PlayerJoin {
//!     name: String,
//! }
//!
//! impl Event for PlayerJoin {}
//!
//! struct Greeter;
//!
//! impl Listener for Greeter {
//!     fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
//!         vec![HandlerSpec::on(EventPriority::Normal, |e: &mut PlayerJoin| {
//!             println!("welcome, {}", e.name);
//!             Ok(())
//!         })]
//!     }
//! }
//! ```

pub mod command;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod loader;
pub mod permission;
pub mod plugin;
pub mod sinks;

pub use command::{ArgSpec, CommandSpec};
pub use descriptor::PluginDescriptor;
pub use error::{EventError, PluginError};
pub use event::{
    AsAny, Event, EventExecutor, EventKey, EventPriority, HandlerSpec, Listener, ListenerTimings,
    RegisteredListener, executor, same_listener,
};
pub use loader::PluginLoader;
pub use permission::{ParsePermissionDefaultError, Permissible, Permission, PermissionDefault};
pub use plugin::{Plugin, PluginMain};
pub use sinks::{CommandSink, Messenger, NoopSink, Scheduler, ServiceRegistry};

/// Current plugin API version. Descriptors must match this exactly.
pub const API_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_is_set() {
        assert_eq!(API_VERSION, 1);
    }

    #[test]
    fn test_loader_trait_is_object_safe() {
        // This compiles only if PluginLoader is object-safe
        fn _takes_loader(_: std::sync::Arc<dyn PluginLoader>) {}
    }

    #[test]
    fn test_event_trait_is_object_safe() {
        fn _takes_event(_: &mut dyn Event) {}
    }
}
