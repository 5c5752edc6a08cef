use thiserror::Error;

/// Failures opening the output stream
///
/// None of these can happen once the stream runs; the callback itself
/// never fails, it renders silence instead.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevices,

    /// Configured `audio_device` index is past the end of the device list
    #[error("audio output device {0} does not exist")]
    DeviceNotFound(usize),

    #[error("no usable stereo output configuration: {0}")]
    ConfigError(String),

    #[error("could not open output stream: {0}")]
    StreamBuildError(String),

    #[error("could not start output stream: {0}")]
    StreamPlayError(String),

    /// The device only offers formats the converter does not handle
    #[error("device sample format {0} not supported (need f32, i16 or u16)")]
    UnsupportedFormat(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
