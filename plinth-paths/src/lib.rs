//! XDG Base Directory paths for plinth.
//!
//! The host uses XDG paths on every platform so configuration and plugin
//! directories live in the same place regardless of OS.

use std::path::PathBuf;

const APP_DIR: &str = "plinth";

/// Get the plinth config directory.
///
/// Returns `$XDG_CONFIG_HOME/plinth` if set, otherwise `~/.config/plinth`.
/// The host configuration file and the default plugin directory live here.
///
/// # Examples
///
/// ```
/// use plinth_paths::config_dir;
///
/// let config = config_dir();
/// let plugin_dir = config.join("plugins");
/// ```
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Get the plinth data directory.
///
/// Returns `$XDG_DATA_HOME/plinth` if set, otherwise `~/.local/share/plinth`.
/// Plugins that keep data on disk get a folder under this directory.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// Default plugin directory, `<config_dir>/plugins`
pub fn plugin_dir() -> PathBuf {
    config_dir().join("plugins")
}

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    match std::env::var_os(var) {
        Some(base) if !base.is_empty() => PathBuf::from(base).join(APP_DIR),
        _ => match dirs::home_dir() {
            Some(home) => home.join(home_relative).join(APP_DIR),
            None => PathBuf::from(home_relative).join(APP_DIR),
        },
    }
}
