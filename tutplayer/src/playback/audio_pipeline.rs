use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;
use tracing::{error, trace, warn};

use media_decode::AudioDecode;
use media_types::{AudioFormat, AudioFrame, Packet, SampleFormat};

use crate::decode::{Dequeue, PacketQueue};

/// Largest decoded frame a codec is expected to hand back, in bytes.
pub const MAX_AUDIO_FRAME_SIZE: usize = 192_000;

/// Size of the buffer decoded PCM is staged in before it is copied out.
pub const SCRATCH_CAPACITY: usize = MAX_AUDIO_FRAME_SIZE * 3 / 2;

/**
    Reasons `fill` had to pad its output with silence.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("packet queue aborted")]
    Aborted,

    #[error("decoded frame of {size} bytes does not fit the {capacity} byte decode buffer")]
    FrameOverflow { size: usize, capacity: usize },

    #[error(
        "decoded frame has {channels} channel(s) of {sample_format:?}, stream was opened with {expected:?}"
    )]
    FormatMismatch {
        expected: AudioFormat,
        channels: u16,
        sample_format: SampleFormat,
    },
}

impl PipelineError {
    /**
        True for invariant failures after which the pipeline only plays silence.
    */
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Aborted)
    }
}

/**
    Counters shared between the audio callback and whoever supervises it.
*/
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_decoded: AtomicU64,
    decode_errors: AtomicU64,
    underruns: AtomicU64,
    starved: AtomicBool,
    failed: AtomicBool,
}

impl PipelineStats {
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    /**
        Packets (or packet remainders) dropped because the decoder rejected them.
    */
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /**
        Times the pipeline needed a packet and found the queue empty.
    */
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /**
        True while the callback thread is parked waiting for a packet.
    */
    pub fn is_starved(&self) -> bool {
        self.starved.load(Ordering::Acquire)
    }

    /**
        True once a fatal error has stopped decoding for good.
    */
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/**
    The packet being decoded and how far into it the decoder has got.
*/
#[derive(Debug, Default)]
struct DecodeCursor {
    packet: Option<Packet>,
    offset: usize,
}

impl DecodeCursor {
    fn remaining(&self) -> &[u8] {
        match &self.packet {
            Some(packet) => &packet.data[self.offset..],
            None => &[],
        }
    }

    fn advance(&mut self, consumed: usize) {
        self.offset += consumed.min(self.remaining().len());
    }

    fn install(&mut self, packet: Packet) {
        self.packet = Some(packet);
        self.offset = 0;
    }

    fn release(&mut self) {
        self.packet = None;
        self.offset = 0;
    }
}

/**
    Pull-driven audio decoding for a playback callback.

    Each `fill` call writes exactly the requested number of bytes, decoding
    packets from the queue one frame at a time as the staged PCM runs out.
    A partially decoded packet stays in the cursor between calls. The
    pipeline is owned by the callback thread; only the queue and the stats
    are shared.
*/
pub struct AudioPipeline<D> {
    queue: Arc<PacketQueue>,
    decoder: D,
    format: AudioFormat,
    cursor: DecodeCursor,
    scratch: Vec<u8>,
    ready_len: usize,
    ready_pos: usize,
    stats: Arc<PipelineStats>,
    fatal: Option<PipelineError>,
}

impl<D: AudioDecode> AudioPipeline<D> {
    pub fn new(queue: Arc<PacketQueue>, decoder: D) -> Self {
        Self::with_scratch_capacity(queue, decoder, SCRATCH_CAPACITY)
    }

    pub fn with_scratch_capacity(queue: Arc<PacketQueue>, decoder: D, capacity: usize) -> Self {
        let format = decoder.output_format();
        Self {
            queue,
            decoder,
            format,
            cursor: DecodeCursor::default(),
            scratch: vec![0; capacity],
            ready_len: 0,
            ready_pos: 0,
            stats: Arc::new(PipelineStats::default()),
            fatal: None,
        }
    }

    /**
        The PCM format `fill` writes, fixed when the pipeline is built.
    */
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /**
        Fill `out` completely with PCM.

        When no more audio can be produced (the queue was aborted, or a
        fatal invariant failure happened now or earlier) the rest of `out`
        is filled with silence and the reason is returned. `out` is always
        fully written either way.
    */
    pub fn fill(&mut self, out: &mut [u8]) -> Result<(), PipelineError> {
        let mut written = 0;

        while written < out.len() {
            if self.ready_pos >= self.ready_len {
                match self.decode_next() {
                    Ok(size) => {
                        self.ready_len = size;
                        self.ready_pos = 0;
                    }
                    Err(err) => {
                        self.ready_len = 0;
                        self.ready_pos = 0;
                        out[written..].fill(self.format.sample_format.silence_byte());
                        trace!(silence = out.len() - written, error = %err, "padded audio buffer");
                        return Err(err);
                    }
                }
            }

            let count = (self.ready_len - self.ready_pos).min(out.len() - written);
            out[written..written + count]
                .copy_from_slice(&self.scratch[self.ready_pos..self.ready_pos + count]);
            written += count;
            self.ready_pos += count;
        }

        Ok(())
    }

    /**
        Decode until one frame is staged in the scratch buffer and return its
        size in bytes.
    */
    fn decode_next(&mut self) -> Result<usize, PipelineError> {
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }

        loop {
            while !self.cursor.remaining().is_empty() {
                let decoded = match self.decoder.decode(self.cursor.remaining()) {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        warn!(error = %err, "audio decode failed, skipping rest of packet");
                        self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                        self.cursor.release();
                        break;
                    }
                };

                self.cursor.advance(decoded.consumed);

                match decoded.frame {
                    Some(frame) if frame.samples > 0 => return self.stage(frame),
                    _ if decoded.consumed == 0 => {
                        warn!("audio decoder made no progress, skipping rest of packet");
                        self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                        self.cursor.release();
                        break;
                    }
                    _ => {}
                }
            }

            self.cursor.release();
            let packet = self.next_packet().ok_or(PipelineError::Aborted)?;
            self.cursor.install(packet);
        }
    }

    fn next_packet(&mut self) -> Option<Packet> {
        match self.queue.get(false) {
            Dequeue::Got(packet) => return Some(packet),
            Dequeue::Aborted => return None,
            Dequeue::Empty => {}
        }

        self.stats.underruns.fetch_add(1, Ordering::Relaxed);
        self.stats.starved.store(true, Ordering::Release);
        let packet = self.queue.get(true).into_packet();
        self.stats.starved.store(false, Ordering::Release);
        packet
    }

    /**
        Copy a decoded frame into the scratch buffer.
    */
    fn stage(&mut self, frame: AudioFrame) -> Result<usize, PipelineError> {
        if frame.channels != self.format.channel_count()
            || frame.sample_format != self.format.sample_format
        {
            return Err(self.poison(PipelineError::FormatMismatch {
                expected: self.format,
                channels: frame.channels,
                sample_format: frame.sample_format,
            }));
        }

        let size = frame.byte_len();
        if size > self.scratch.len() {
            return Err(self.poison(PipelineError::FrameOverflow {
                size,
                capacity: self.scratch.len(),
            }));
        }

        self.scratch[..size].copy_from_slice(frame.pcm());
        self.stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
        Ok(size)
    }

    fn poison(&mut self, err: PipelineError) -> PipelineError {
        error!(error = %err, "audio pipeline stopped, playing silence from now on");
        self.fatal = Some(err.clone());
        self.stats.failed.store(true, Ordering::Release);
        err
    }
}

impl<D> std::fmt::Debug for AudioPipeline<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPipeline")
            .field("format", &self.format)
            .field("scratch_capacity", &self.scratch.len())
            .field("ready", &(self.ready_len - self.ready_pos))
            .field("fatal", &self.fatal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    use media_decode::{Decoded, PcmDecoder};
    use media_types::{ChannelLayout, Error, Result};

    use super::*;
    use crate::decode::QuitSignal;

    const WAIT: Duration = Duration::from_secs(5);

    fn mono_s16() -> AudioFormat {
        AudioFormat::new(8000, ChannelLayout::Mono, SampleFormat::S16)
    }

    fn queue() -> (QuitSignal, Arc<PacketQueue>) {
        let quit = QuitSignal::new();
        let queue = Arc::new(PacketQueue::new(&quit));
        (quit, queue)
    }

    enum Step {
        NeedMore(usize),
        Frame {
            consumed: usize,
            samples: usize,
            channels: u16,
            value: u8,
        },
        Fail,
    }

    fn frame(consumed: usize, samples: usize, value: u8) -> Step {
        Step::Frame {
            consumed,
            samples,
            channels: 1,
            value,
        }
    }

    /// Decoder that replays a fixed script and records the slice lengths it saw.
    struct ScriptedDecoder {
        steps: VecDeque<Step>,
        seen: Arc<parking_lot::Mutex<Vec<usize>>>,
    }

    impl ScriptedDecoder {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                seen: Arc::default(),
            }
        }
    }

    impl AudioDecode for ScriptedDecoder {
        fn decode(&mut self, input: &[u8]) -> Result<Decoded> {
            self.seen.lock().push(input.len());
            match self.steps.pop_front() {
                Some(Step::NeedMore(consumed)) => Ok(Decoded::needs_more(consumed)),
                Some(Step::Frame {
                    consumed,
                    samples,
                    channels,
                    value,
                }) => {
                    let data = vec![value; samples * channels as usize * 2];
                    let frame = AudioFrame::new(data, samples, channels, SampleFormat::S16, 8000)?;
                    Ok(Decoded::frame(consumed, frame))
                }
                Some(Step::Fail) => Err(Error::codec("scripted failure")),
                None => Ok(Decoded::needs_more(input.len())),
            }
        }

        fn output_format(&self) -> AudioFormat {
            mono_s16()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let start = Instant::now();
        while !condition() {
            assert!(start.elapsed() < WAIT, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn empty_request_touches_nothing() {
        let (_quit, queue) = queue();
        queue.put(Packet::new(vec![1; 8], 0)).unwrap();
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), ScriptedDecoder::new(vec![]));

        assert_eq!(pipeline.fill(&mut []), Ok(()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn aborted_queue_yields_full_silence() {
        let (quit, queue) = queue();
        quit.cancel();
        let decoder = PcmDecoder::new(mono_s16(), 4).unwrap();
        let mut pipeline = AudioPipeline::new(queue, decoder);

        let mut out = vec![0xAA; 37];
        assert_eq!(pipeline.fill(&mut out), Err(PipelineError::Aborted));
        assert_eq!(out, vec![0; 37]);
    }

    #[test]
    fn partial_frames_carry_over_between_fills() {
        let (quit, queue) = queue();
        queue.put(Packet::new((0..16).collect(), 0)).unwrap();
        let decoder = PcmDecoder::new(mono_s16(), 4).unwrap();
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);

        let mut out = vec![0xFF; 5];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);

        let mut out = vec![0xFF; 7];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, vec![5, 6, 7, 8, 9, 10, 11]);

        let mut out = vec![0xFF; 4];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, vec![12, 13, 14, 15]);
        assert_eq!(pipeline.stats().frames_decoded(), 2);

        quit.cancel();
        let mut out = vec![0xFF; 3];
        assert_eq!(pipeline.fill(&mut out), Err(PipelineError::Aborted));
        assert_eq!(out, vec![0; 3]);
    }

    #[test]
    fn one_packet_feeds_several_frames() {
        let (_quit, queue) = queue();
        queue.put(Packet::new((0..12).collect(), 0)).unwrap();
        let decoder = PcmDecoder::new(mono_s16(), 2).unwrap();
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);

        let mut out = vec![0; 12];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, (0..12).collect::<Vec<u8>>());
        assert_eq!(pipeline.stats().frames_decoded(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn frames_span_packet_boundaries() {
        let (_quit, queue) = queue();
        queue.put(Packet::new(vec![1; 3], 0)).unwrap();
        queue.put(Packet::new(vec![2; 3], 0)).unwrap();
        queue.put(Packet::new(vec![3; 2], 0)).unwrap();
        let decoder = PcmDecoder::new(mono_s16(), 4).unwrap();
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);

        let mut out = vec![0; 8];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, vec![1, 1, 1, 2, 2, 2, 3, 3]);
    }

    #[test]
    fn decoder_error_skips_rest_of_packet() {
        let (_quit, queue) = queue();
        queue.put(Packet::new(vec![0; 8], 0)).unwrap();
        queue.put(Packet::new(vec![0; 4], 0)).unwrap();
        let decoder = ScriptedDecoder::new(vec![frame(2, 1, 1), Step::Fail, frame(4, 1, 2)]);
        let seen = Arc::clone(&decoder.seen);
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);

        let mut out = vec![0xFF; 4];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, vec![1, 1, 2, 2]);
        assert_eq!(*seen.lock(), vec![8, 6, 4]);
        assert_eq!(pipeline.stats().decode_errors(), 1);
    }

    #[test]
    fn needs_more_input_then_abort_gives_silence() {
        let (quit, queue) = queue();
        queue.put(Packet::new(vec![5; 8], 0)).unwrap();
        let decoder = ScriptedDecoder::new(vec![Step::NeedMore(8)]);
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);
        let stats = pipeline.stats();

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut out = vec![0xAA; 6];
            let result = pipeline.fill(&mut out);
            let _ = tx.send((result, out));
        });

        wait_until(|| stats.is_starved());
        assert!(queue.is_empty());
        quit.cancel();

        let (result, out) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(result, Err(PipelineError::Aborted));
        assert_eq!(out, vec![0; 6]);
        assert_eq!(stats.frames_decoded(), 0);
        assert_eq!(stats.underruns(), 1);
    }

    #[test]
    fn stalled_decoder_moves_to_next_packet() {
        let (_quit, queue) = queue();
        queue.put(Packet::new(vec![0; 6], 0)).unwrap();
        queue.put(Packet::new(vec![0; 2], 0)).unwrap();
        let decoder = ScriptedDecoder::new(vec![Step::NeedMore(0), frame(2, 1, 7)]);
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);

        let mut out = vec![0; 2];
        pipeline.fill(&mut out).unwrap();
        assert_eq!(out, vec![7, 7]);
        assert_eq!(pipeline.stats().decode_errors(), 1);
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let (_quit, queue) = queue();
        queue.put(Packet::new(vec![0; 8], 0)).unwrap();
        queue.put(Packet::new(vec![0; 8], 0)).unwrap();
        let decoder = ScriptedDecoder::new(vec![frame(8, 4, 9), frame(8, 1, 9)]);
        let mut pipeline = AudioPipeline::with_scratch_capacity(Arc::clone(&queue), decoder, 4);

        let overflow = PipelineError::FrameOverflow {
            size: 8,
            capacity: 4,
        };
        let mut out = vec![0xAA; 6];
        assert_eq!(pipeline.fill(&mut out), Err(overflow.clone()));
        assert_eq!(out, vec![0; 6]);
        assert!(overflow.is_fatal());
        assert!(pipeline.stats().has_failed());

        // Poisoned: the second packet is never touched.
        let mut out = vec![0xAA; 2];
        assert_eq!(pipeline.fill(&mut out), Err(overflow));
        assert_eq!(out, vec![0; 2]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn frame_in_another_format_is_fatal() {
        let (_quit, queue) = queue();
        queue.put(Packet::new(vec![0; 8], 0)).unwrap();
        let decoder = ScriptedDecoder::new(vec![Step::Frame {
            consumed: 8,
            samples: 2,
            channels: 2,
            value: 1,
        }]);
        let mut pipeline = AudioPipeline::new(queue, decoder);

        let mut out = vec![0xAA; 4];
        let err = pipeline.fill(&mut out).unwrap_err();
        assert!(matches!(err, PipelineError::FormatMismatch { channels: 2, .. }));
        assert_eq!(out, vec![0; 4]);
    }

    #[test]
    fn unsigned_silence_is_midpoint() {
        let (quit, queue) = queue();
        quit.cancel();
        let format = AudioFormat::new(8000, ChannelLayout::Mono, SampleFormat::U8);
        let mut pipeline = AudioPipeline::new(queue, PcmDecoder::new(format, 4).unwrap());

        let mut out = vec![0; 5];
        assert_eq!(pipeline.fill(&mut out), Err(PipelineError::Aborted));
        assert_eq!(out, vec![0x80; 5]);
    }

    #[test]
    fn concurrent_producer_is_played_in_order() {
        let (quit, queue) = queue();
        let expected: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();

        let producer = {
            let queue = Arc::clone(&queue);
            let data = expected.clone();
            thread::spawn(move || {
                for chunk in data.chunks(100) {
                    queue.put(Packet::new(chunk.to_vec(), 0)).unwrap();
                    thread::yield_now();
                }
            })
        };

        let decoder = PcmDecoder::new(mono_s16(), 64).unwrap();
        let mut pipeline = AudioPipeline::new(Arc::clone(&queue), decoder);

        let mut played = Vec::new();
        let mut out = vec![0; 77];
        while played.len() + out.len() <= 3968 {
            pipeline.fill(&mut out).unwrap();
            played.extend_from_slice(&out);
        }

        producer.join().unwrap();
        quit.cancel();
        assert_eq!(played[..], expected[..played.len()]);
    }
}
