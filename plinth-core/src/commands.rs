//! Command registry for plugin-declared commands

use std::collections::BTreeMap;

use parking_lot::RwLock;

use plinth_plugin_api::{CommandSink, CommandSpec, PluginError};

/// A command registered by a plugin
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredCommand {
    /// Name of the plugin that owns this command
    pub plugin_name: String,
    /// Command specification
    pub spec: CommandSpec,
}

/// Registry of all plugin commands.
///
/// Each command is stored under its full path, which starts with the owning
/// plugin's name, so two plugins can never claim the same path.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<BTreeMap<Vec<String>, RegisteredCommand>>,
}

fn full_path(plugin_name: &str, path: &[String]) -> Vec<String> {
    let mut full = Vec::with_capacity(path.len() + 1);
    full.push(plugin_name.to_string());
    full.extend(path.iter().cloned());
    full
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register commands for a plugin, replacing any it registered before
    /// under the same paths
    pub fn register(&self, plugin_name: &str, commands: &[CommandSpec]) {
        let mut table = self.commands.write();
        for spec in commands {
            table.insert(
                full_path(plugin_name, &spec.path),
                RegisteredCommand {
                    plugin_name: plugin_name.to_string(),
                    spec: spec.clone(),
                },
            );
        }
    }

    /// Owner of the command `plugin_name` would register at `path`, if any
    pub fn check_conflict(&self, plugin_name: &str, path: &[String]) -> Option<String> {
        self.commands
            .read()
            .get(&full_path(plugin_name, path))
            .map(|c| c.plugin_name.clone())
    }

    /// Find a command by its full path
    pub fn find(&self, path: &[String]) -> Option<RegisteredCommand> {
        self.commands.read().get(path).cloned()
    }

    /// Find the longest registered prefix of `path`.
    ///
    /// Returns the command and the number of path elements that name it;
    /// whatever follows are arguments.
    pub fn find_longest_match(&self, path: &[String]) -> Option<(RegisteredCommand, usize)> {
        let table = self.commands.read();
        (1..=path.len())
            .rev()
            .find_map(|len| table.get(&path[..len]).map(|cmd| (cmd.clone(), len)))
    }

    /// All commands, ordered by full path
    pub fn all_commands(&self) -> Vec<(Vec<String>, RegisteredCommand)> {
        self.commands
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Unregister all commands for a plugin
    pub fn unregister(&self, plugin_name: &str) {
        self.commands
            .write()
            .retain(|_, v| v.plugin_name != plugin_name);
    }

    pub fn clear(&self) {
        self.commands.write().clear();
    }
}

impl CommandSink for CommandRegistry {
    fn register_all(&self, prefix: &str, commands: &[CommandSpec]) -> Result<(), PluginError> {
        self.register(prefix, commands);
        tracing::debug!(plugin = %prefix, count = commands.len(), "Registered plugin commands");
        Ok(())
    }
}
