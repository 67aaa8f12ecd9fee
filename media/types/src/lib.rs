/*!
    Shared types for the tutplayer crates.

    This crate defines the values that cross crate boundaries: encoded
    packets coming out of a demuxer, decoded audio frames coming out of a
    decoder, and the formats that describe them. It has no dependency on
    FFmpeg so the queue and pipeline can be built and tested without it.
*/

mod error;
mod format;
mod frame;
mod packet;
mod stream;

pub use error::{Error, Result};
pub use format::{AudioFormat, ChannelLayout, SampleFormat};
pub use frame::AudioFrame;
pub use packet::Packet;
pub use stream::{AudioStreamInfo, Rational};
