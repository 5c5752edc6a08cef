//! Configuration file loading and saving

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::global::GlobalConfig;

/// Failure to write a config or song file
///
/// In-memory state stays authoritative; callers decide whether to retry.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid file format: {0}")]
    Format(String),
}

/// Write a text file, creating parent directories as needed
pub(crate) fn write_text(path: &Path, contents: &str) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, contents).map_err(io_err)
}

/// Load the global configuration
///
/// If the file doesn't exist, returns the built-in defaults.
/// If the file exists but is invalid, logs a warning and returns defaults.
pub fn load_config(path: &Path) -> GlobalConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return GlobalConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match GlobalConfig::parse(&contents) {
            Ok(config) => {
                log::info!("load_config: Successfully loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                GlobalConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            GlobalConfig::default()
        }
    }
}

/// Save the global configuration
pub fn save_config(config: &GlobalConfig, path: &Path) -> Result<(), PersistError> {
    log::info!("save_config: Saving to {:?}", path);
    write_text(path, &config.to_ini())?;
    log::debug!("save_config: Config saved");
    Ok(())
}

/// Write the built-in defaults to `path` (`--dump-config`)
pub fn write_default_config(path: &Path) -> Result<()> {
    save_config(&GlobalConfig::default(), path)
        .with_context(|| format!("Failed to write default config to {:?}", path))
}
