/*!
    Audio playback in the shape of a classic decode loop.

    A producer thread demuxes packets into a thread-safe [`PacketQueue`];
    the playback device's callback pulls PCM through an [`AudioPipeline`],
    which decodes queued packets on demand and pads with silence once the
    shared [`QuitSignal`] is raised.

    Without features the player reads WAV files and renders into a WAV file.
    `device` adds cpal output and `ffmpeg` adds container demuxing and
    codec decoding through FFmpeg.
*/

pub mod audio;
pub mod config;
pub mod decode;
pub mod error;
pub mod playback;

pub use config::{Settings, SettingsError};
pub use decode::{Dequeue, PacketQueue, QueueError, QuitSignal};
pub use error::PlayerError;
pub use playback::{AudioPipeline, PipelineError, PlaybackReport, Player};
