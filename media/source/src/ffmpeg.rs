/*!
    FFmpeg container source.
*/

use std::path::Path;
use std::time::Duration;

use ffmpeg_next::{codec, format::context::Input as InputContext, media::Type};
use tracing::debug;

use media_types::{
    AudioFormat, AudioStreamInfo, ChannelLayout, Error, Packet, Rational, Result, SampleFormat,
};

use crate::Demux;

/**
    A container demuxer built on libavformat.

    Selects the first (best) audio and video streams. Packets of both are
    returned; everything else in the file is skipped.
*/
pub struct FfmpegSource {
    input: InputContext,
    audio: Option<AudioStreamInfo>,
    audio_parameters: Option<codec::Parameters>,
    video_stream_index: Option<usize>,
}

// SAFETY: the input context is only reached through `&mut self`, and the
// codec parameters are an owned copy.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

        let input = ffmpeg_next::format::input(&path).map_err(|e| {
            if e.to_string().contains("No such file") {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    e.to_string(),
                ))
            } else {
                Error::codec(e.to_string())
            }
        })?;

        let video_stream_index = input.streams().best(Type::Video).map(|s| s.index());

        let (audio, audio_parameters) = match input.streams().best(Type::Audio) {
            Some(stream) => {
                let parameters = stream.parameters();
                let context = codec::context::Context::from_parameters(parameters.clone())
                    .map_err(|e| Error::codec(e.to_string()))?;
                let decoder = context
                    .decoder()
                    .audio()
                    .map_err(|e| Error::codec(e.to_string()))?;

                let time_base = stream.time_base();
                let time_base = Rational::new(time_base.numerator(), time_base.denominator());
                let duration = (stream.duration() > 0).then(|| {
                    Duration::from_secs_f64((stream.duration() as f64 * time_base.to_f64()).max(0.0))
                });

                let info = AudioStreamInfo {
                    stream_index: stream.index(),
                    format: AudioFormat::new(
                        decoder.rate(),
                        ChannelLayout::from_count(decoder.channels() as u16),
                        sample_format_from_ffmpeg(decoder.format()).unwrap_or(SampleFormat::F32),
                    ),
                    time_base,
                    duration,
                    codec_name: format!("{:?}", parameters.id()).to_lowercase(),
                };
                (Some(info), Some(parameters))
            }
            None => (None, None),
        };

        debug!(
            path = %path.as_ref().display(),
            audio = ?audio.as_ref().map(|a| a.stream_index),
            video = ?video_stream_index,
            "opened ffmpeg source"
        );

        Ok(Self {
            input,
            audio,
            audio_parameters,
            video_stream_index,
        })
    }

    /**
        Take the codec parameters of the audio stream, for opening a decoder.
    */
    pub fn take_audio_parameters(&mut self) -> Option<codec::Parameters> {
        self.audio_parameters.take()
    }
}

impl Demux for FfmpegSource {
    fn audio_stream(&self) -> Option<&AudioStreamInfo> {
        self.audio.as_ref()
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let audio_index = self.audio.as_ref().map(|a| a.stream_index);

        loop {
            let (stream, ffmpeg_packet) = match self.input.packets().next() {
                Some(result) => result,
                None => return Ok(None),
            };

            let stream_index = stream.index();
            if Some(stream_index) != audio_index && Some(stream_index) != self.video_stream_index {
                continue;
            }

            let data = ffmpeg_packet.data().map(|d| d.to_vec()).unwrap_or_default();
            let mut packet = Packet::new(data, stream_index).with_timestamps(
                ffmpeg_packet.pts(),
                ffmpeg_packet.dts(),
                ffmpeg_packet.duration(),
            );
            packet.is_keyframe = ffmpeg_packet.is_key();

            return Ok(Some(packet));
        }
    }
}

impl std::fmt::Debug for FfmpegSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSource")
            .field("audio", &self.audio)
            .field("video_stream_index", &self.video_stream_index)
            .finish_non_exhaustive()
    }
}

fn sample_format_from_ffmpeg(format: ffmpeg_next::format::Sample) -> Option<SampleFormat> {
    use ffmpeg_next::format::Sample;

    match format {
        Sample::F32(_) => Some(SampleFormat::F32),
        Sample::F64(_) => Some(SampleFormat::F64),
        Sample::I16(_) => Some(SampleFormat::S16),
        Sample::I32(_) => Some(SampleFormat::S32),
        Sample::U8(_) => Some(SampleFormat::U8),
        _ => None,
    }
}
