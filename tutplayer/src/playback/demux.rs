use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use media_source::Demux;

use crate::decode::{PacketQueue, QueueError, QuitSignal};
use crate::error::PlayerError;

/**
    What the producer thread did before it stopped.
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub audio_packets: u64,
    pub audio_bytes: u64,
    pub skipped_packets: u64,
    pub reached_eof: bool,
}

/**
    Read packets from `source` and queue those of stream `audio_index`.

    Stops at end of input, when `quit` is set, or once `max_packets` packets
    (of any stream) have been read. Packets of other streams are dropped.
    An aborted queue ends the loop normally; only source errors are
    returned.
*/
pub fn demux_audio<S: Demux + ?Sized>(
    source: &mut S,
    audio_index: usize,
    queue: &PacketQueue,
    quit: &QuitSignal,
    max_packets: Option<u64>,
) -> Result<DemuxStats, PlayerError> {
    let mut stats = DemuxStats::default();
    let mut read = 0u64;

    while !quit.is_quit() {
        if max_packets.is_some_and(|max| read >= max) {
            debug!(read, "packet limit reached");
            break;
        }

        let Some(packet) = source.read_packet()? else {
            stats.reached_eof = true;
            break;
        };
        read += 1;

        if packet.stream_index != audio_index {
            stats.skipped_packets += 1;
            continue;
        }

        let size = packet.size() as u64;
        match queue.put(packet) {
            Ok(()) => {
                stats.audio_packets += 1;
                stats.audio_bytes += size;
            }
            Err(QueueError::Aborted) => break,
            Err(err) => return Err(err.into()),
        }
    }

    info!(
        audio_packets = stats.audio_packets,
        audio_bytes = stats.audio_bytes,
        skipped = stats.skipped_packets,
        eof = stats.reached_eof,
        "demux finished"
    );
    Ok(stats)
}

/**
    Run [`demux_audio`] on its own thread, taking ownership of the source.
*/
pub fn spawn_demux<S: Demux + 'static>(
    mut source: S,
    audio_index: usize,
    queue: Arc<PacketQueue>,
    quit: QuitSignal,
    max_packets: Option<u64>,
) -> Result<JoinHandle<Result<DemuxStats, PlayerError>>, PlayerError> {
    thread::Builder::new()
        .name("demux".into())
        .spawn(move || {
            let result = demux_audio(&mut source, audio_index, &queue, &quit, max_packets);
            if let Err(err) = &result {
                error!(error = %err, "demux failed");
            }
            result
        })
        .map_err(|source| PlayerError::Spawn {
            name: "demux",
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use media_types::{
        AudioFormat, AudioStreamInfo, ChannelLayout, Error, Packet, Rational, Result, SampleFormat,
    };

    use super::*;

    /// In-memory source; `fail_after` makes the read after that many packets fail.
    struct VecSource {
        info: AudioStreamInfo,
        packets: VecDeque<Packet>,
        fail_after: Option<usize>,
        read: usize,
    }

    impl VecSource {
        fn new(streams: &[usize]) -> Self {
            Self {
                info: AudioStreamInfo {
                    stream_index: 1,
                    format: AudioFormat::new(8000, ChannelLayout::Mono, SampleFormat::S16),
                    time_base: Rational::new(1, 8000),
                    duration: None,
                    codec_name: "pcm".into(),
                },
                packets: streams
                    .iter()
                    .enumerate()
                    .map(|(i, &stream)| Packet::new(vec![i as u8; 4], stream))
                    .collect(),
                fail_after: None,
                read: 0,
            }
        }
    }

    impl Demux for VecSource {
        fn audio_stream(&self) -> Option<&AudioStreamInfo> {
            Some(&self.info)
        }

        fn read_packet(&mut self) -> Result<Option<Packet>> {
            if self.fail_after == Some(self.read) {
                return Err(Error::invalid_data("corrupt container"));
            }
            self.read += 1;
            Ok(self.packets.pop_front())
        }
    }

    fn drain(queue: &PacketQueue) -> Vec<Packet> {
        std::iter::from_fn(|| queue.get(false).into_packet()).collect()
    }

    #[test]
    fn queues_audio_and_drops_other_streams() {
        let quit = QuitSignal::new();
        let queue = PacketQueue::new(&quit);
        let mut source = VecSource::new(&[1, 0, 1, 2, 1]);

        let stats = demux_audio(&mut source, 1, &queue, &quit, None).unwrap();
        assert_eq!(
            stats,
            DemuxStats {
                audio_packets: 3,
                audio_bytes: 12,
                skipped_packets: 2,
                reached_eof: true,
            }
        );

        let firsts: Vec<u8> = drain(&queue).iter().map(|p| p.data[0]).collect();
        assert_eq!(firsts, vec![0, 2, 4]);
    }

    #[test]
    fn packet_limit_counts_every_stream() {
        let quit = QuitSignal::new();
        let queue = PacketQueue::new(&quit);
        let mut source = VecSource::new(&[1, 0, 1, 1, 1]);

        let stats = demux_audio(&mut source, 1, &queue, &quit, Some(3)).unwrap();
        assert_eq!(stats.audio_packets, 2);
        assert_eq!(stats.skipped_packets, 1);
        assert!(!stats.reached_eof);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn quit_before_start_reads_nothing() {
        let quit = QuitSignal::new();
        let queue = PacketQueue::new(&quit);
        let mut source = VecSource::new(&[1, 1]);
        quit.cancel();

        let stats = demux_audio(&mut source, 1, &queue, &quit, None).unwrap();
        assert_eq!(stats, DemuxStats::default());
        assert_eq!(source.read, 0);
    }

    #[test]
    fn source_errors_are_returned() {
        let quit = QuitSignal::new();
        let queue = PacketQueue::new(&quit);
        let mut source = VecSource::new(&[1, 1, 1]);
        source.fail_after = Some(1);

        let result = demux_audio(&mut source, 1, &queue, &quit, None);
        assert!(matches!(result, Err(PlayerError::Media(Error::InvalidData(_)))));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn quit_unblocks_producer_on_full_queue() {
        let quit = QuitSignal::new();
        let queue = Arc::new(PacketQueue::bounded(1, &quit).unwrap());
        let source = VecSource::new(&[1, 1, 1, 1]);

        let handle = spawn_demux(source, 1, Arc::clone(&queue), quit.clone(), None).unwrap();
        while queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());

        quit.cancel();
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.audio_packets, 1);
        assert!(!stats.reached_eof);
    }

    #[test]
    fn spawned_producer_runs_to_eof() {
        let quit = QuitSignal::new();
        let queue = Arc::new(PacketQueue::new(&quit));
        let source = VecSource::new(&[1, 1, 0, 1]);

        let handle = spawn_demux(source, 1, Arc::clone(&queue), quit, None).unwrap();
        assert_eq!(handle.thread().name(), Some("demux"));

        let stats = handle.join().unwrap().unwrap();
        assert!(stats.reached_eof);
        assert_eq!(drain(&queue).len(), 3);
    }
}
