//! Host services the plugin manager notifies while enabling and disabling
//! plugins

use crate::command::CommandSpec;
use crate::error::PluginError;
use crate::plugin::Plugin;

/// Scheduler holding tasks submitted by plugins
pub trait Scheduler: Send + Sync {
    /// Cancel every pending or repeating task owned by `plugin`
    fn cancel_tasks(&self, plugin: &Plugin) -> Result<(), PluginError>;
}

/// Registry of services provided by plugins
pub trait ServiceRegistry: Send + Sync {
    /// Drop every service registered by `plugin`
    fn unregister_all(&self, plugin: &Plugin) -> Result<(), PluginError>;
}

/// Plugin messaging channels
pub trait Messenger: Send + Sync {
    fn unregister_incoming_channels(&self, plugin: &Plugin) -> Result<(), PluginError>;

    fn unregister_outgoing_channels(&self, plugin: &Plugin) -> Result<(), PluginError>;
}

/// Command table receiving the commands a plugin declares
pub trait CommandSink: Send + Sync {
    /// Register `commands` under the `prefix` namespace
    fn register_all(&self, prefix: &str, commands: &[CommandSpec]) -> Result<(), PluginError>;
}

/// Sink that accepts everything and does nothing, for hosts without the
/// corresponding subsystem
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl Scheduler for NoopSink {
    fn cancel_tasks(&self, _plugin: &Plugin) -> Result<(), PluginError> {
        Ok(())
    }
}

impl ServiceRegistry for NoopSink {
    fn unregister_all(&self, _plugin: &Plugin) -> Result<(), PluginError> {
        Ok(())
    }
}

impl Messenger for NoopSink {
    fn unregister_incoming_channels(&self, _plugin: &Plugin) -> Result<(), PluginError> {
        Ok(())
    }

    fn unregister_outgoing_channels(&self, _plugin: &Plugin) -> Result<(), PluginError> {
        Ok(())
    }
}

impl CommandSink for NoopSink {
    fn register_all(&self, _prefix: &str, _commands: &[CommandSpec]) -> Result<(), PluginError> {
        Ok(())
    }
}
