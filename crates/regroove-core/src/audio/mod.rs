//! Audio output
//!
//! The [`AudioProcessor`] is everything the audio thread runs per buffer:
//! it drains the command queue, renders through the playback engine and
//! applies the effects chain. [`start_audio`] wires it to a cpal output
//! stream; tests drive it directly.

mod cpal_backend;
mod device;
mod error;
mod processor;

pub use cpal_backend::{start_audio, AudioHandle, AudioOutputConfig};
pub use device::{list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use processor::{AudioProcessor, SharedProcessor};
