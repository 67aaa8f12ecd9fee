use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use media_decode::{AudioDecode, PcmDecoder};
use media_source::{Demux, WavSource};
use media_types::{AudioFormat, AudioStreamInfo};

use crate::audio::WavSink;
use crate::config::Settings;
use crate::decode::{PacketQueue, QuitSignal};
use crate::error::PlayerError;

use super::audio_pipeline::{AudioPipeline, PipelineStats, SCRATCH_CAPACITY};
use super::demux::{DemuxStats, spawn_demux};

#[cfg(feature = "device")]
use crate::audio::AudioOutput;

const DRAIN_POLL: Duration = Duration::from_millis(10);

type BoxedDecoder = Box<dyn AudioDecode + Send>;

enum Output {
    File(WavSink),
    #[cfg(feature = "device")]
    Device(AudioOutput),
}

/**
    Summary of a finished playback.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    pub demux: DemuxStats,
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub underruns: u64,
    /// Frames rendered, when playing into a file.
    pub frames_written: Option<u64>,
}

/**
    Plays the audio stream of one input.

    One producer thread demuxes into the packet queue; the output's callback
    thread drains it through the audio pipeline. Both share one quit signal.
*/
pub struct Player {
    quit: QuitSignal,
    queue: Arc<PacketQueue>,
    stats: Arc<PipelineStats>,
    stream: AudioStreamInfo,
    format: AudioFormat,
    buffer_period: Duration,
    output: Option<Output>,
    producer: Option<JoinHandle<Result<DemuxStats, PlayerError>>>,
}

impl Player {
    /**
        Open `input` and start playing it, into the WAV file `output` if one is
        given or the default audio device otherwise.
    */
    pub fn open(
        input: impl AsRef<Path>,
        output: Option<PathBuf>,
        settings: &Settings,
    ) -> Result<Self, PlayerError> {
        let input = input.as_ref();
        let (source, decoder) = open_input(input, settings)?;
        let stream = source
            .audio_stream()
            .cloned()
            .ok_or_else(|| PlayerError::NoAudioStream(input.to_path_buf()))?;
        let format = decoder.output_format();

        info!(
            input = %input.display(),
            codec = %stream.codec_name,
            stream = stream.stream_index,
            ?format,
            duration = ?stream.duration,
            "opened input"
        );

        let quit = QuitSignal::new();
        let queue = Arc::new(match settings.queue_capacity {
            Some(capacity) => PacketQueue::bounded(capacity, &quit)?,
            None => PacketQueue::new(&quit),
        });

        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);
        let stats = pipeline.stats();
        let fill = move |out: &mut [u8]| {
            // The pipeline logs its own failures and pads the buffer with silence.
            let _ = pipeline.fill(out);
        };

        let output = match output {
            Some(path) => Output::File(WavSink::start(
                path,
                format,
                settings.buffer_samples,
                settings.realtime_sink,
                fill,
            )?),
            None => open_device(format, settings.buffer_samples, fill)?,
        };

        let producer = spawn_demux(
            source,
            stream.stream_index,
            Arc::clone(&queue),
            quit.clone(),
            settings.max_packets,
        )?;

        Ok(Self {
            quit,
            queue,
            stats,
            buffer_period: Duration::from_secs_f64(
                settings.buffer_samples as f64 / format.sample_rate.max(1) as f64,
            ),
            stream,
            format,
            output: Some(output),
            producer: Some(producer),
        })
    }

    pub fn stream_info(&self) -> &AudioStreamInfo {
        &self.stream
    }

    /**
        The PCM format handed to the output.
    */
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn quit_signal(&self) -> &QuitSignal {
        &self.quit
    }

    /**
        Block until the input has been played out, then stop.

        Playback is over once the producer is done, the queue is empty and the
        pipeline is waiting for a packet. One more device buffer is allowed
        to drain before the output is stopped.
    */
    pub fn wait(&mut self) -> Result<PlaybackReport, PlayerError> {
        let demux = self.join_producer()?.unwrap_or_default();

        while !self.quit.is_quit() && !self.stats.has_failed() {
            if self.queue.is_empty() && self.stats.is_starved() {
                break;
            }
            thread::sleep(DRAIN_POLL);
        }
        if self.stats.has_failed() {
            warn!("playback ended early after a decode failure");
        }

        thread::sleep(self.buffer_period);
        let frames_written = self.stop()?;

        Ok(PlaybackReport {
            demux,
            frames_decoded: self.stats.frames_decoded(),
            decode_errors: self.stats.decode_errors(),
            underruns: self.stats.underruns(),
            frames_written,
        })
    }

    /**
        Stop playback now: wake every blocked thread, stop the output and
        join the producer. Returns the frames written when playing to a file.
    */
    pub fn stop(&mut self) -> Result<Option<u64>, PlayerError> {
        self.quit.cancel();

        let frames_written = match self.output.take() {
            Some(Output::File(mut sink)) => Some(sink.stop()?),
            #[cfg(feature = "device")]
            Some(Output::Device(device)) => {
                device.stop()?;
                None
            }
            None => None,
        };

        if let Err(err) = self.join_producer() {
            debug!(error = %err, "producer ended with an error");
        }
        Ok(frames_written)
    }

    fn join_producer(&mut self) -> Result<Option<DemuxStats>, PlayerError> {
        let Some(handle) = self.producer.take() else {
            return Ok(None);
        };
        let stats = handle
            .join()
            .map_err(|_| PlayerError::ThreadPanicked("demux"))??;
        Ok(Some(stats))
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "player did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("stream", &self.stream)
            .field("format", &self.format)
            .field("queued", &self.queue.len())
            .field("quit", &self.quit.is_quit())
            .finish_non_exhaustive()
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn open_input(
    input: &Path,
    settings: &Settings,
) -> Result<(Box<dyn Demux>, BoxedDecoder), PlayerError> {
    if is_wav(input) {
        let source = WavSource::with_packet_frames(input, settings.packet_frames)?;
        let frame_bytes = source.format().buffer_size(settings.packet_frames);
        if frame_bytes > SCRATCH_CAPACITY {
            return Err(PlayerError::FrameTooLarge {
                frames: settings.packet_frames,
                bytes: frame_bytes,
                capacity: SCRATCH_CAPACITY,
            });
        }
        let decoder = PcmDecoder::new(source.format(), settings.packet_frames)?;
        return Ok((Box::new(source), Box::new(decoder)));
    }
    open_container(input)
}

#[cfg(feature = "ffmpeg")]
fn open_container(input: &Path) -> Result<(Box<dyn Demux>, BoxedDecoder), PlayerError> {
    use media_decode::FfmpegAudioDecoder;
    use media_source::FfmpegSource;

    let mut source = FfmpegSource::open(input)?;
    let parameters = source
        .take_audio_parameters()
        .ok_or_else(|| PlayerError::NoAudioStream(input.to_path_buf()))?;
    let decoder = FfmpegAudioDecoder::new(parameters)?;
    Ok((Box::new(source), Box::new(decoder)))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_container(input: &Path) -> Result<(Box<dyn Demux>, BoxedDecoder), PlayerError> {
    Err(PlayerError::UnsupportedInput(input.to_path_buf()))
}

#[cfg(feature = "device")]
fn open_device<F>(format: AudioFormat, buffer_samples: usize, fill: F) -> Result<Output, PlayerError>
where
    F: FnMut(&mut [u8]) + Send + 'static,
{
    let buffer_samples = u32::try_from(buffer_samples).unwrap_or(u32::MAX);
    Ok(Output::Device(AudioOutput::open(format, buffer_samples, fill)?))
}

#[cfg(not(feature = "device"))]
fn open_device<F>(_format: AudioFormat, _buffer_samples: usize, _fill: F) -> Result<Output, PlayerError>
where
    F: FnMut(&mut [u8]) + Send + 'static,
{
    Err(PlayerError::NoOutput)
}
