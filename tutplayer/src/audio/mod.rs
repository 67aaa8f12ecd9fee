/*!
    Playback devices.

    A device pulls PCM by calling a fill callback with a byte buffer of
    `buffer_samples` frames in the negotiated format, from its own thread.
*/

#[cfg(feature = "device")]
mod output;
mod wav_sink;

#[cfg(feature = "device")]
pub use output::AudioOutput;
pub use wav_sink::WavSink;

use media_types::SampleFormat;
use thiserror::Error;

pub const DEFAULT_BUFFER_SAMPLES: usize = 1024;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("audio device error: {0}")]
    DeviceError(String),

    #[error("audio stream error: {0}")]
    StreamError(String),

    #[error("{0:?} samples are not supported by this output")]
    UnsupportedFormat(SampleFormat),

    #[error("WAV output failed: {0}")]
    Wav(#[from] hound::Error),
}
