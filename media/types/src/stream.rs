/*!
    Stream information types.
*/

use std::time::Duration;

use crate::AudioFormat;

/**
    A rational number, used for stream time bases.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

/**
    Information about the audio stream selected from a source.
*/
#[derive(Clone, Debug)]
pub struct AudioStreamInfo {
    /// Index of the stream within its container.
    pub stream_index: usize,
    /// Format of the stream as stored (before any decoding).
    pub format: AudioFormat,
    /// Time base for packet timestamps.
    pub time_base: Rational,
    /// Total duration (may be unavailable for some streams).
    pub duration: Option<Duration>,
    /// Codec name, for logging.
    pub codec_name: String,
}

impl AudioStreamInfo {
    /**
        Returns the number of channels.
    */
    pub fn channel_count(&self) -> u16 {
        self.format.channel_count()
    }
}
