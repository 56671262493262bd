//! Plugin descriptor - the manifest data a loader reads from a plugin file

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::permission::Permission;

/// Descriptor of a plugin: identity, dependencies, authorship and the
/// commands and permissions it declares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin name. Case-sensitive and unique within a host.
    pub name: String,
    /// Plugin version
    #[serde(default = "default_version")]
    pub version: String,
    /// API version this plugin was built against
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Authors, most significant first
    #[serde(default)]
    pub authors: Vec<String>,
    /// Plugins that must load before this one
    #[serde(default)]
    pub depend: Vec<String>,
    /// Plugins that should load before this one when present
    #[serde(default)]
    pub soft_depend: Vec<String>,
    /// Commands this plugin provides
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    /// Permissions this plugin defines
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

fn default_version() -> String {
    "0.0.1".to_string()
}

fn default_api_version() -> u32 {
    crate::API_VERSION
}

impl PluginDescriptor {
    /// Create a descriptor with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            api_version: crate::API_VERSION,
            description: String::new(),
            authors: Vec::new(),
            depend: Vec::new(),
            soft_depend: Vec::new(),
            commands: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Parse a descriptor from TOML manifest text
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Builder: set the version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Builder: add a hard dependency
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depend.push(name.into());
        self
    }

    /// Builder: add a soft dependency
    #[must_use]
    pub fn soft_depends_on(mut self, name: impl Into<String>) -> Self {
        self.soft_depend.push(name.into());
        self
    }

    /// Builder: add an author
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    /// Builder: declare a command
    #[must_use]
    pub fn with_command(mut self, command: CommandSpec) -> Self {
        self.commands.push(command);
        self
    }

    /// Builder: declare a permission
    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Name and version, e.g. `Warps v1.2.0`
    pub fn full_name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// First declared author, if any
    pub fn primary_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// Check the descriptor is usable as a plugin identity.
    ///
    /// Names may only contain ASCII letters, digits, spaces, `_`, `.` and `-`.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if let Some(c) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-')))
        {
            return Err(format!("name '{}' contains invalid character '{c}'", self.name));
        }
        if self.api_version != crate::API_VERSION {
            return Err(format!(
                "API version mismatch: host expects {}, plugin has {}",
                crate::API_VERSION,
                self.api_version
            ));
        }
        Ok(())
    }
}
