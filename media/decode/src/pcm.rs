/*!
    Raw PCM "decoder".
*/

use std::mem;

use media_types::{AudioFormat, AudioFrame, Error, Result};

use crate::{AudioDecode, Decoded};

/**
    Decoder for packets that already carry packed, native-endian PCM.

    Each call takes at most one frame of `frame_samples` samples per channel
    and returns every whole sample frame it now holds, so a short packet at
    the end of a stream is still played. A packet larger than one frame is
    only partially consumed. Only a sample frame split across packets waits
    for more input.
*/
#[derive(Debug)]
pub struct PcmDecoder {
    format: AudioFormat,
    frame_samples: usize,
    pending: Vec<u8>,
}

impl PcmDecoder {
    pub fn new(format: AudioFormat, frame_samples: usize) -> Result<Self> {
        if frame_samples == 0 {
            return Err(Error::invalid_data("PCM frame size must be at least one sample"));
        }
        Ok(Self {
            format,
            frame_samples,
            pending: Vec::with_capacity(format.buffer_size(frame_samples)),
        })
    }

    fn frame_bytes(&self) -> usize {
        self.format.buffer_size(self.frame_samples)
    }

    /**
        Bytes held back waiting for the rest of the current frame.
    */
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl AudioDecode for PcmDecoder {
    fn decode(&mut self, input: &[u8]) -> Result<Decoded> {
        let frame_bytes = self.frame_bytes();
        let take = (frame_bytes - self.pending.len()).min(input.len());
        self.pending.extend_from_slice(&input[..take]);

        let bytes_per_frame = self.format.bytes_per_frame();
        let samples = self.pending.len() / bytes_per_frame;
        if samples == 0 {
            return Ok(Decoded::needs_more(take));
        }

        let split = self.pending.split_off(samples * bytes_per_frame);
        let data = mem::replace(&mut self.pending, split);
        let frame = AudioFrame::new(
            data,
            samples,
            self.format.channel_count(),
            self.format.sample_format,
            self.format.sample_rate,
        )?;
        Ok(Decoded::frame(take, frame))
    }

    fn output_format(&self) -> AudioFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use media_types::{ChannelLayout, SampleFormat};

    use super::*;

    fn stereo_s16() -> AudioFormat {
        AudioFormat::new(44100, ChannelLayout::Stereo, SampleFormat::S16)
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        assert!(PcmDecoder::new(stereo_s16(), 0).is_err());
    }

    #[test]
    fn exact_input_produces_frame() {
        let mut decoder = PcmDecoder::new(stereo_s16(), 4).unwrap();
        let input: Vec<u8> = (0..16).collect();

        let decoded = decoder.decode(&input).unwrap();
        assert_eq!(decoded.consumed, 16);
        let frame = decoded.frame.unwrap();
        assert_eq!(frame.samples, 4);
        assert_eq!(frame.channels, 2);
        assert_eq!(frame.pcm(), &input[..]);
    }

    #[test]
    fn short_input_yields_its_whole_samples() {
        let mut decoder = PcmDecoder::new(stereo_s16(), 4).unwrap();

        let decoded = decoder.decode(&[1; 10]).unwrap();
        assert_eq!(decoded.consumed, 10);
        let frame = decoded.frame.unwrap();
        assert_eq!(frame.samples, 2);
        assert_eq!(frame.pcm(), &[1; 8]);
        assert_eq!(decoder.pending(), 2);

        let decoded = decoder.decode(&[2; 6]).unwrap();
        assert_eq!(decoded.consumed, 6);
        let frame = decoded.frame.unwrap();
        assert_eq!(frame.samples, 2);
        assert_eq!(&frame.pcm()[..2], &[1; 2]);
        assert_eq!(&frame.pcm()[2..], &[2; 6]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn split_sample_frame_needs_more() {
        let mut decoder = PcmDecoder::new(stereo_s16(), 4).unwrap();

        let decoded = decoder.decode(&[3; 3]).unwrap();
        assert_eq!(decoded.consumed, 3);
        assert!(decoded.frame.is_none());
        assert_eq!(decoder.pending(), 3);

        let decoded = decoder.decode(&[4; 1]).unwrap();
        let frame = decoded.frame.unwrap();
        assert_eq!(frame.samples, 1);
        assert_eq!(frame.pcm(), &[3, 3, 3, 4]);
    }

    #[test]
    fn stream_tail_shorter_than_a_frame_is_played() {
        let mut decoder = PcmDecoder::new(stereo_s16(), 1024).unwrap();

        let decoded = decoder.decode(&[5; 40]).unwrap();
        assert_eq!(decoded.consumed, 40);
        assert_eq!(decoded.frame.unwrap().samples, 10);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn long_input_is_partially_consumed() {
        let mut decoder = PcmDecoder::new(stereo_s16(), 2).unwrap();
        let input = [9u8; 20];

        let decoded = decoder.decode(&input).unwrap();
        assert_eq!(decoded.consumed, 8);
        assert_eq!(decoded.frame.unwrap().byte_len(), 8);

        let decoded = decoder.decode(&input[8..]).unwrap();
        assert_eq!(decoded.consumed, 8);
        assert!(decoded.frame.is_some());

        let decoded = decoder.decode(&input[16..]).unwrap();
        assert_eq!(decoded.consumed, 4);
        assert_eq!(decoded.frame.unwrap().samples, 1);
    }

    #[test]
    fn boxed_decoder_delegates() {
        let mut decoder: Box<dyn AudioDecode> = Box::new(PcmDecoder::new(stereo_s16(), 1).unwrap());
        assert_eq!(decoder.output_format(), stereo_s16());
        assert!(decoder.decode(&[0; 4]).unwrap().frame.is_some());
    }
}
