//! Standard locations for regroove configuration

use std::path::PathBuf;

/// Get the configuration directory
///
/// Returns: `<config dir>/regroove` (e.g. `~/.config/regroove` on Linux)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("regroove")
}

/// Get the default global config file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("regroove.ini")
}
