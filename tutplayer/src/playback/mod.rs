mod audio_pipeline;
mod demux;
mod player;

pub use audio_pipeline::{
    AudioPipeline, MAX_AUDIO_FRAME_SIZE, PipelineError, PipelineStats, SCRATCH_CAPACITY,
};
pub use demux::{DemuxStats, demux_audio, spawn_demux};
pub use player::{PlaybackReport, Player};
