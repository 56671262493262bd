//! Command declarations carried by plugin descriptors

use serde::{Deserialize, Serialize};

/// Specification for a command a plugin provides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command path, e.g., ["warp", "set"] -> `<plugin> warp set`
    pub path: Vec<String>,
    /// Short description for help text
    #[serde(default)]
    pub description: String,
    /// Argument specifications
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

/// Specification for a command argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Argument name
    pub name: String,
    /// Description for help text
    #[serde(default)]
    pub description: String,
    /// Whether this argument is required
    #[serde(default)]
    pub required: bool,
}

impl CommandSpec {
    /// Create a command with the given path and no arguments
    pub fn new<I, S>(path: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            description: description.into(),
            args: Vec::new(),
        }
    }
}
