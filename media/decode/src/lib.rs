/*!
    Audio decoding for the tutplayer crates.

    A decoder is fed slices of encoded packet data and reports how much of
    each slice it consumed and whether a complete frame came out. This lets
    the caller keep a partially consumed packet around between calls.
*/

mod pcm;

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

pub use pcm::PcmDecoder;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegAudioDecoder;

use media_types::{AudioFormat, AudioFrame, Result};

/**
    Outcome of feeding one input slice to a decoder.
*/
#[derive(Debug)]
pub struct Decoded {
    /// Number of input bytes the decoder took.
    pub consumed: usize,
    /// A complete frame, or `None` if the decoder needs more input.
    pub frame: Option<AudioFrame>,
}

impl Decoded {
    pub fn needs_more(consumed: usize) -> Self {
        Self {
            consumed,
            frame: None,
        }
    }

    pub fn frame(consumed: usize, frame: AudioFrame) -> Self {
        Self {
            consumed,
            frame: Some(frame),
        }
    }
}

/**
    A stateful audio decoder.

    `Err` means the slice could not be decoded; it is distinct from a
    `Decoded` with no frame, which only asks for more input.
*/
pub trait AudioDecode {
    fn decode(&mut self, input: &[u8]) -> Result<Decoded>;

    /**
        The packed PCM format every produced frame is in.
    */
    fn output_format(&self) -> AudioFormat;
}

impl<D: AudioDecode + ?Sized> AudioDecode for Box<D> {
    fn decode(&mut self, input: &[u8]) -> Result<Decoded> {
        (**self).decode(input)
    }

    fn output_format(&self) -> AudioFormat {
        (**self).output_format()
    }
}
