use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;
use crate::decode::QueueError;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Media(#[from] media_types::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("{} has no audio stream", .0.display())]
    NoAudioStream(PathBuf),

    #[error("cannot play {}: only WAV input is supported without the `ffmpeg` feature", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("{frames} frames per packet need {bytes} bytes, more than the {capacity} byte decode buffer")]
    FrameTooLarge {
        frames: usize,
        bytes: usize,
        capacity: usize,
    },

    #[error("no output file given and no audio device support (enable the `device` feature)")]
    NoOutput,

    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}
