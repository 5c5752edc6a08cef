//! Configuration: the global `regroove.ini` and the shared INI reader
//!
//! ```ignore
//! use regroove_core::config::{default_config_path, load_config, save_config};
//!
//! let path = default_config_path();
//! let mut config = load_config(&path);
//! config.devices.midi_device_1 = 1;
//! save_config(&config, &path)?;
//! ```

mod global;
pub mod ini;
mod io;
mod paths;

pub use global::{DeviceConfig, EffectSettings, GlobalConfig};
pub use ini::ConfigParseError;
pub(crate) use io::write_text;
pub use io::{load_config, save_config, write_default_config, PersistError};
pub use paths::{default_config_dir, default_config_path};
