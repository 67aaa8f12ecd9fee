/*!
    WAV file source.
*/

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use hound::WavReader;
use tracing::debug;

use media_types::{
    AudioFormat, AudioStreamInfo, ChannelLayout, Error, Packet, Rational, Result, SampleFormat,
};

use crate::Demux;

/// Frames per packet when none is given, one device buffer's worth.
pub const DEFAULT_PACKET_FRAMES: usize = 1024;

/**
    Demuxes a PCM WAV file into packets of native-endian samples.

    The file has a single stream at index 0. Each packet carries
    `packet_frames` frames (the last one may be shorter) and is stamped
    with its position in samples.
*/
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    info: AudioStreamInfo,
    packet_frames: usize,
    position: i64,
}

impl WavSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_packet_frames(path, DEFAULT_PACKET_FRAMES)
    }

    pub fn with_packet_frames<P: AsRef<Path>>(path: P, packet_frames: usize) -> Result<Self> {
        if packet_frames == 0 {
            return Err(Error::invalid_data("packet size must be at least one frame"));
        }

        let reader = WavReader::open(path.as_ref()).map_err(wav_error)?;
        let spec = reader.spec();

        let sample_format = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 8) => SampleFormat::U8,
            (hound::SampleFormat::Int, 16) => SampleFormat::S16,
            (hound::SampleFormat::Int, 32) => SampleFormat::S32,
            (hound::SampleFormat::Float, 32) => SampleFormat::F32,
            (kind, bits) => {
                return Err(Error::unsupported_format(format!(
                    "{}-bit {:?} WAV samples",
                    bits, kind
                )));
            }
        };

        let channels = ChannelLayout::from_count(spec.channels);
        if channels.channels() != spec.channels {
            return Err(Error::unsupported_format(format!(
                "{} channel WAV files",
                spec.channels
            )));
        }

        let format = AudioFormat::new(spec.sample_rate, channels, sample_format);
        let duration = (spec.sample_rate > 0).then(|| {
            Duration::from_secs_f64(reader.duration() as f64 / spec.sample_rate as f64)
        });

        debug!(
            path = %path.as_ref().display(),
            ?format,
            frames = reader.duration(),
            "opened WAV source"
        );

        Ok(Self {
            reader,
            info: AudioStreamInfo {
                stream_index: 0,
                format,
                time_base: Rational::new(1, spec.sample_rate as i32),
                duration,
                codec_name: "pcm".into(),
            },
            packet_frames,
            position: 0,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.info.format
    }

    fn read_samples(&mut self, count: usize) -> Result<Vec<u8>> {
        let width = self.info.format.sample_format.bytes_per_sample();
        let mut data = Vec::with_capacity(count * width);

        match self.info.format.sample_format {
            SampleFormat::U8 => {
                for sample in self.reader.samples::<i8>().take(count) {
                    // hound centers 8-bit samples on zero; WAV stores them offset by 128.
                    data.push((sample.map_err(wav_error)? as i16 + 128) as u8);
                }
            }
            SampleFormat::S16 => {
                for sample in self.reader.samples::<i16>().take(count) {
                    data.extend_from_slice(&sample.map_err(wav_error)?.to_ne_bytes());
                }
            }
            SampleFormat::S32 => {
                for sample in self.reader.samples::<i32>().take(count) {
                    data.extend_from_slice(&sample.map_err(wav_error)?.to_ne_bytes());
                }
            }
            SampleFormat::F32 => {
                for sample in self.reader.samples::<f32>().take(count) {
                    data.extend_from_slice(&sample.map_err(wav_error)?.to_ne_bytes());
                }
            }
            other => {
                return Err(Error::unsupported_format(format!("{:?} WAV samples", other)));
            }
        }

        Ok(data)
    }
}

impl Demux for WavSource {
    fn audio_stream(&self) -> Option<&AudioStreamInfo> {
        Some(&self.info)
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let channels = self.info.format.channel_count() as usize;
        let data = self.read_samples(self.packet_frames * channels)?;
        if data.is_empty() {
            return Ok(None);
        }

        let frames = (data.len() / self.info.format.bytes_per_frame()) as i64;
        let mut packet = Packet::new(data, self.info.stream_index).with_timestamps(
            Some(self.position),
            Some(self.position),
            frames,
        );
        packet.is_keyframe = true;
        self.position += frames;

        Ok(Some(packet))
    }
}

impl Iterator for WavSource {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_packet().transpose()
    }
}

impl std::fmt::Debug for WavSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSource")
            .field("info", &self.info)
            .field("packet_frames", &self.packet_frames)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

fn wav_error(err: hound::Error) -> Error {
    match err {
        hound::Error::IoError(e) => Error::Io(e),
        hound::Error::Unsupported => Error::unsupported_format("WAV variant"),
        other => Error::invalid_data(other.to_string()),
    }
}
