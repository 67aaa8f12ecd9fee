/*!
    Media sources and demuxing for the tutplayer crates.

    A source opens a container, picks the first audio stream and hands out
    encoded packets in file order. Packets of other streams are still
    returned, tagged with their stream index, so the caller decides what to
    drop.
*/

mod wav;

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

pub use wav::{DEFAULT_PACKET_FRAMES, WavSource};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;

use media_types::{AudioStreamInfo, Packet, Result};

/**
    A demuxer that can be moved onto a producer thread.
*/
pub trait Demux: Send {
    /**
        The first audio stream of the source, if it has one.
    */
    fn audio_stream(&self) -> Option<&AudioStreamInfo>;

    /**
        Read the next packet.

        Returns `Ok(None)` at end of stream.
    */
    fn read_packet(&mut self) -> Result<Option<Packet>>;
}

impl<D: Demux + ?Sized> Demux for Box<D> {
    fn audio_stream(&self) -> Option<&AudioStreamInfo> {
        (**self).audio_stream()
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        (**self).read_packet()
    }
}
