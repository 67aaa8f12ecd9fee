/*!
    Decoded audio frame type.
*/

use crate::{Error, Result, SampleFormat};

/**
    A block of decoded, packed PCM samples.

    `data` holds at least `byte_len()` bytes; anything beyond that is
    padding left by the decoder and is never played.
*/
#[derive(Clone, Debug)]
pub struct AudioFrame {
    data: Vec<u8>,
    /// Samples per channel.
    pub samples: usize,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample format of `data`.
    pub sample_format: SampleFormat,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    /**
        Create a frame, checking that `data` covers every sample.
    */
    pub fn new(
        data: Vec<u8>,
        samples: usize,
        channels: u16,
        sample_format: SampleFormat,
        sample_rate: u32,
    ) -> Result<Self> {
        let needed = pcm_size(samples, channels, sample_format);
        if data.len() < needed {
            return Err(Error::invalid_data(format!(
                "audio frame has {} bytes, expected at least {} for {} samples",
                data.len(),
                needed,
                samples
            )));
        }
        Ok(Self {
            data,
            samples,
            channels,
            sample_format,
            sample_rate,
        })
    }

    /**
        Returns the PCM byte size: channels × samples × bytes per sample.
    */
    pub fn byte_len(&self) -> usize {
        pcm_size(self.samples, self.channels, self.sample_format)
    }

    /**
        Returns exactly the playable PCM bytes.
    */
    pub fn pcm(&self) -> &[u8] {
        &self.data[..self.byte_len()]
    }
}

fn pcm_size(samples: usize, channels: u16, format: SampleFormat) -> usize {
    samples * channels as usize * format.bytes_per_sample()
}
