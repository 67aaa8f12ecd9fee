use bytemuck::Pod;
use cpal::{
    BufferSize, Device, SampleRate, SizedSample, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use tracing::{error, info};

use media_types::{AudioFormat, SampleFormat};

use super::AudioError;

/**
    The default output device, opened in the stream's own format.

    The fill callback runs on cpal's audio thread. The stream plays until
    this value is stopped or dropped.
*/
pub struct AudioOutput {
    stream: Stream,
    config: StreamConfig,
}

impl AudioOutput {
    pub fn open<F>(format: AudioFormat, buffer_samples: u32, fill: F) -> Result<Self, AudioError>
    where
        F: FnMut(&mut [u8]) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        info!(device = %device.name().unwrap_or_default(), "audio device");

        let config = StreamConfig {
            channels: format.channel_count(),
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Fixed(buffer_samples),
        };

        let stream = match format.sample_format {
            SampleFormat::U8 => build::<u8, _>(&device, &config, fill),
            SampleFormat::S16 => build::<i16, _>(&device, &config, fill),
            SampleFormat::S32 => build::<i32, _>(&device, &config, fill),
            SampleFormat::F32 => build::<f32, _>(&device, &config, fill),
            SampleFormat::F64 => build::<f64, _>(&device, &config, fill),
            other => Err(AudioError::UnsupportedFormat(other)),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self { stream, config })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stop(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }
}

fn build<T, F>(device: &Device, config: &StreamConfig, mut fill: F) -> Result<Stream, AudioError>
where
    T: SizedSample + Pod,
    F: FnMut(&mut [u8]) + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill(bytemuck::cast_slice_mut(data));
            },
            |err| {
                error!(error = %err, "audio stream error");
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoDevice,
            cpal::BuildStreamError::StreamConfigNotSupported => {
                AudioError::DeviceError(format!("device does not accept {config:?}"))
            }
            other => AudioError::StreamError(other.to_string()),
        })
}
