/*!
    Encoded packet type.
*/

/**
    A unit of still-encoded data belonging to one stream.

    Produced by a demuxer, handed through the packet queue and consumed by a
    decoder. Timestamps are carried through untouched.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Encoded payload.
    pub data: Vec<u8>,
    /// Index of the stream this packet belongs to.
    pub stream_index: usize,
    /// Presentation timestamp in stream time base units.
    pub pts: Option<i64>,
    /// Decode timestamp in stream time base units.
    pub dts: Option<i64>,
    /// Duration in stream time base units (0 if unknown).
    pub duration: i64,
    /// Whether the demuxer flagged this packet as a keyframe.
    pub is_keyframe: bool,
}

impl Packet {
    /**
        Create a packet for `stream_index` with no timing information.
    */
    pub fn new(data: Vec<u8>, stream_index: usize) -> Self {
        Self {
            data,
            stream_index,
            pts: None,
            dts: None,
            duration: 0,
            is_keyframe: false,
        }
    }

    pub fn with_timestamps(mut self, pts: Option<i64>, dts: Option<i64>, duration: i64) -> Self {
        self.pts = pts;
        self.dts = dts;
        self.duration = duration;
        self
    }

    /**
        Returns the payload size in bytes.
    */
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_payload() {
        let packet = Packet::new(vec![0; 500], 1);
        assert_eq!(packet.size(), 500);
    }

    #[test]
    fn timestamps_are_kept() {
        let packet = Packet::new(vec![1, 2, 3], 0).with_timestamps(Some(90), Some(60), 30);
        assert_eq!(packet.pts, Some(90));
        assert_eq!(packet.dts, Some(60));
        assert_eq!(packet.duration, 30);
    }
}
