/*!
    FFmpeg-backed audio decoder.
*/

use ffmpeg_next::{
    ChannelLayout as FFmpegChannelLayout, codec, ffi,
    software::resampling::context::Context as ResamplerContext,
    util::frame::audio::Audio as AudioFrameFFmpeg,
};
use tracing::debug;

use media_types::{AudioFormat, AudioFrame, ChannelLayout, Error, Result, SampleFormat};

use crate::{AudioDecode, Decoded};

/**
    Audio decoder built on libavcodec.

    FFmpeg's send/receive model is mapped onto the consumed-count contract:
    a frame still buffered inside the codec is returned with `consumed == 0`
    so the caller keeps its packet; otherwise the whole slice is sent and at
    most one frame is received. Frames are converted to the packed output
    format by a resampler created on the first frame.
*/
pub struct FfmpegAudioDecoder {
    decoder: codec::decoder::Audio,
    resampler: Option<ResamplerContext>,
    decoded: AudioFrameFFmpeg,
    output: AudioFormat,
}

// SAFETY: the codec and resampler contexts are only touched through
// `&mut self`, so they are never used from two threads at once.
unsafe impl Send for FfmpegAudioDecoder {}

impl FfmpegAudioDecoder {
    /**
        Open a decoder producing signed 16-bit PCM at the codec's own rate
        and channel count.
    */
    pub fn new(parameters: codec::Parameters) -> Result<Self> {
        let decoder = open_decoder(parameters)?;
        let output = AudioFormat::new(
            decoder.rate(),
            ChannelLayout::from_count(decoder.channels() as u16),
            SampleFormat::S16,
        );
        Ok(Self::from_parts(decoder, output))
    }

    /**
        Open a decoder converting every frame to `output`.
    */
    pub fn with_output(parameters: codec::Parameters, output: AudioFormat) -> Result<Self> {
        let decoder = open_decoder(parameters)?;
        Ok(Self::from_parts(decoder, output))
    }

    fn from_parts(decoder: codec::decoder::Audio, output: AudioFormat) -> Self {
        debug!(
            rate = decoder.rate(),
            channels = decoder.channels(),
            ?output,
            "opened ffmpeg audio decoder"
        );
        Self {
            decoder,
            resampler: None,
            decoded: AudioFrameFFmpeg::empty(),
            output,
        }
    }

    /**
        Try to pull one frame out of the codec into `self.decoded`.
    */
    fn receive(&mut self) -> Result<bool> {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(false),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(e) => Err(Error::codec(e.to_string())),
        }
    }

    /**
        Convert `self.decoded` to the packed output format.
    */
    fn convert(&mut self) -> Result<AudioFrame> {
        let src_samples = self.decoded.samples();
        let src_rate = self.decoded.rate();
        let src_layout = source_layout(&self.decoded);

        let dst_sample = sample_format_to_ffmpeg(self.output.sample_format)?;
        let dst_layout = channel_layout_to_ffmpeg(self.output.channels);

        if self.resampler.is_none() {
            let context = ResamplerContext::get(
                self.decoded.format(),
                src_layout,
                src_rate,
                dst_sample,
                dst_layout,
                self.output.sample_rate,
            )
            .map_err(|e| Error::codec(format!("failed to create resampler: {}", e)))?;
            self.resampler = Some(context);
        }

        let output_samples = if src_rate == self.output.sample_rate {
            src_samples
        } else {
            ((src_samples as u64 * self.output.sample_rate as u64) / src_rate.max(1) as u64 + 64)
                as usize
        };

        let mut dst_frame = AudioFrameFFmpeg::new(dst_sample, output_samples, dst_layout);
        dst_frame.set_rate(self.output.sample_rate);

        if let Some(resampler) = self.resampler.as_mut() {
            resampler
                .run(&self.decoded, &mut dst_frame)
                .map_err(|e| Error::codec(format!("resampling failed: {}", e)))?;
        }

        let samples = dst_frame.samples();
        let total_bytes = self.output.buffer_size(samples);
        let plane = dst_frame.data(0);
        if plane.len() < total_bytes {
            return Err(Error::invalid_data(format!(
                "resampled plane has {} bytes, expected {}",
                plane.len(),
                total_bytes
            )));
        }

        AudioFrame::new(
            plane[..total_bytes].to_vec(),
            samples,
            self.output.channel_count(),
            self.output.sample_format,
            self.output.sample_rate,
        )
    }
}

impl AudioDecode for FfmpegAudioDecoder {
    fn decode(&mut self, input: &[u8]) -> Result<Decoded> {
        // Frames left over from an earlier packet go out first.
        if self.receive()? {
            return Ok(Decoded::frame(0, self.convert()?));
        }

        let packet = ffmpeg_next::Packet::copy(input);
        self.decoder
            .send_packet(&packet)
            .map_err(|e| Error::codec(e.to_string()))?;

        if self.receive()? {
            Ok(Decoded::frame(input.len(), self.convert()?))
        } else {
            Ok(Decoded::needs_more(input.len()))
        }
    }

    fn output_format(&self) -> AudioFormat {
        self.output
    }
}

impl std::fmt::Debug for FfmpegAudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegAudioDecoder")
            .field("sample_rate", &self.decoder.rate())
            .field("channels", &self.decoder.channels())
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

fn open_decoder(parameters: codec::Parameters) -> Result<codec::decoder::Audio> {
    ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

    let context = codec::context::Context::from_parameters(parameters)
        .map_err(|e| Error::codec(e.to_string()))?;

    context
        .decoder()
        .audio()
        .map_err(|e| Error::codec(e.to_string()))
}

fn sample_format_to_ffmpeg(format: SampleFormat) -> Result<ffmpeg_next::format::Sample> {
    use ffmpeg_next::format::Sample;
    use ffmpeg_next::format::sample::Type;

    match format {
        SampleFormat::F32 => Ok(Sample::F32(Type::Packed)),
        SampleFormat::F64 => Ok(Sample::F64(Type::Packed)),
        SampleFormat::S16 => Ok(Sample::I16(Type::Packed)),
        SampleFormat::S32 => Ok(Sample::I32(Type::Packed)),
        SampleFormat::U8 => Ok(Sample::U8(Type::Packed)),
        _ => Err(Error::unsupported_format(format!(
            "sample format {:?} not supported",
            format
        ))),
    }
}

/**
    The layout the codec actually decoded, or the default layout for its
    channel count when the frame does not carry one.
*/
fn source_layout(frame: &AudioFrameFFmpeg) -> FFmpegChannelLayout {
    let layout = frame.channel_layout();
    if layout.channels() == i32::from(frame.channels()) {
        layout
    } else {
        FFmpegChannelLayout::default(i32::from(frame.channels()))
    }
}

fn channel_layout_to_ffmpeg(layout: ChannelLayout) -> FFmpegChannelLayout {
    match layout {
        ChannelLayout::Mono => FFmpegChannelLayout::MONO,
        ChannelLayout::Stereo => FFmpegChannelLayout::STEREO,
        ChannelLayout::Surround5_1 => FFmpegChannelLayout::_5POINT1,
        ChannelLayout::Surround7_1 => FFmpegChannelLayout::_7POINT1,
        _ => FFmpegChannelLayout::STEREO,
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::format::{Sample, sample::Type};

    use super::*;

    #[test]
    fn three_channel_source_keeps_its_layout() {
        ffmpeg_next::init().unwrap();
        let layout = FFmpegChannelLayout::default(3);
        let frame = AudioFrameFFmpeg::new(Sample::I16(Type::Packed), 16, layout);

        let source = source_layout(&frame);
        assert_eq!(source.channels(), 3);
        assert_eq!(source, layout);
        assert_ne!(source, channel_layout_to_ffmpeg(ChannelLayout::from_count(3)));
    }
}
