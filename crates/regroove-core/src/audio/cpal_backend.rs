//! CPAL output stream driving the [`AudioProcessor`]
//!
//! ```text
//! ┌──────────────────┐   rtrb (SPSC)   ┌─────────────────────┐
//! │     Session      │────commands────►│  CPAL Audio Thread  │
//! │   (UI thread)    │◄────events──────│  try_lock processor │
//! └──────────────────┘                 └─────────────────────┘
//!          │  module swap (short lock)            │
//!          └─────────────► SharedProcessor ◄──────┘
//! ```
//!
//! The callback never blocks: if the session holds the processor lock
//! (module swap in progress) the buffer is filled with silence. A poisoned
//! lock is recovered rather than treated as held.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};

use super::device::find_output_device;
use super::error::{AudioError, AudioResult};
use super::processor::{try_lock_processor, SharedProcessor};
use crate::types::{DEFAULT_BUFFER_FRAMES, MAX_BUFFER_FRAMES, SAMPLE_RATE};

/// Stream settings requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioOutputConfig {
    /// Output device index; `None` uses the host default
    pub device: Option<usize>,
    pub sample_rate: u32,
    pub buffer_frames: u32,
}

impl Default for AudioOutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES as u32,
        }
    }
}

/// Keeps the output stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Output latency in milliseconds (one buffer)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the output device and start pulling audio from `processor`
///
/// The processor is switched to the negotiated sample rate before the
/// stream starts.
pub fn start_audio(config: &AudioOutputConfig, processor: SharedProcessor) -> AudioResult<AudioHandle> {
    let device = find_output_device(config.device)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = get_output_config(&device, config.sample_rate)?;
    let sample_rate = supported.sample_rate().0;
    let buffer_size = config.buffer_frames.clamp(64, MAX_BUFFER_FRAMES as u32);

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };
    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency), {:?}",
        stream_config.channels,
        sample_rate,
        buffer_size,
        buffer_size as f32 / sample_rate as f32 * 1000.0,
        supported.sample_format()
    );

    match processor.lock() {
        Ok(mut p) => p.set_sample_rate(sample_rate),
        Err(_) => return Err(AudioError::ConfigError("audio processor lock poisoned".to_string())),
    }

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_output_stream::<f32>(&device, &stream_config, processor)?,
        SampleFormat::I16 => build_output_stream::<i16>(&device, &stream_config, processor)?,
        SampleFormat::U16 => build_output_stream::<u16>(&device, &stream_config, processor)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
    })
}

/// Pick a stereo config at the requested rate, preferring f32 then i16
fn get_output_config(device: &cpal::Device, target_rate: u32) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };
    let best = [SampleFormat::F32, SampleFormat::I16]
        .iter()
        .find_map(|format| {
            supported_configs
                .iter()
                .filter(|c| c.sample_format() == *format && c.channels() >= 2)
                .find(in_range)
        })
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| AudioError::ConfigError("No suitable output configuration found".to_string()))?;

    let rate = if in_range(&best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };
    Ok(best.clone().with_sample_rate(rate))
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    processor: SharedProcessor,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = config.channels as usize;
    // Interleaved stereo scratch, allocated once outside the callback
    let mut scratch = vec![0i16; MAX_BUFFER_FRAMES * 2];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let Some(mut processor) = try_lock_processor(&processor) else {
                    data.fill(T::EQUILIBRIUM);
                    return;
                };
                for chunk in data.chunks_mut(MAX_BUFFER_FRAMES * channels) {
                    let frames = chunk.len() / channels;
                    let stereo = &mut scratch[..frames * 2];
                    processor.process(stereo);

                    for (frame, pair) in chunk.chunks_mut(channels).zip(stereo.chunks_exact(2)) {
                        frame[0] = T::from_sample(pair[0]);
                        if channels > 1 {
                            frame[1] = T::from_sample(pair[1]);
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = T::EQUILIBRIUM;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
