//! Error types for plugin and loader authors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by loaders and plugin lifecycle hooks
#[derive(Error, Debug)]
pub enum PluginError {
    /// The plugin's descriptor could not be read or is malformed
    #[error("Invalid plugin description in {path}: {reason}")]
    InvalidDescription { path: PathBuf, reason: String },

    /// The file carries a valid descriptor but could not be materialized
    #[error("Invalid plugin {path}: {reason}")]
    InvalidPlugin { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl PluginError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a descriptor error for `path`
    pub fn invalid_description(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDescription {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a materialization error for `path`
    pub fn invalid_plugin(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPlugin {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by event handlers
///
/// Anything other than [`EventError::AuthorNag`] is logged against the event
/// and the owning plugin, and dispatch moves on to the next listener.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The handler hit a deprecated usage pattern. The host reports this to
    /// the plugin's author once and then stays quiet for that plugin.
    #[error("{0}")]
    AuthorNag(String),

    /// The handler failed
    #[error("{0}")]
    Failed(String),
}

impl EventError {
    /// Create a handler failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create a legacy-usage warning with a message
    pub fn nag(message: impl Into<String>) -> Self {
        Self::AuthorNag(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::invalid_description("plugins/a.plugin.toml", "missing name");
        assert_eq!(
            err.to_string(),
            "Invalid plugin description in plugins/a.plugin.toml: missing name"
        );

        let err = PluginError::Config("bad filter".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad filter");

        let err = PluginError::custom("something happened");
        assert_eq!(err.to_string(), "something happened");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let plugin_err: PluginError = io_err.into();

        assert!(matches!(plugin_err, PluginError::Io(_)));
        assert!(plugin_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_invalid_plugin_mentions_path() {
        let err = PluginError::invalid_plugin("/srv/plugins/x.plugin.toml", "no factory");
        assert!(err.to_string().contains("/srv/plugins/x.plugin.toml"));
        assert!(err.to_string().contains("no factory"));
    }

    #[test]
    fn test_event_error_helpers() {
        assert_eq!(
            EventError::nag("uses old api"),
            EventError::AuthorNag("uses old api".into())
        );
        assert_eq!(EventError::failed("boom").to_string(), "boom");
    }
}
