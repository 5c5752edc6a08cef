//! Output device enumeration on the default cpal host
//!
//! Devices are addressed by their index in the host's output device list,
//! which is what `audio_device` in the config refers to.

use cpal::traits::{DeviceTrait, HostTrait};

use super::error::{AudioError, AudioResult};

/// An output device as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// List output devices of the default host
pub fn list_output_devices() -> AudioResult<Vec<OutputDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let is_default = default_name.as_ref() == Some(&name);
            OutputDevice {
                index,
                name,
                is_default,
            }
        })
        .collect())
}

/// Resolve a configured device index, `None` selecting the host default
pub(super) fn find_output_device(index: Option<usize>) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    match index {
        None => host.default_output_device().ok_or(AudioError::NoDevices),
        Some(index) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .nth(index)
            .ok_or(AudioError::DeviceNotFound(index)),
    }
}
