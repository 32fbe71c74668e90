//! Frame types.
//!
//! - `VideoFrame`: one decoded image (raw bytes, dimensions, pixel encoding).
//! - `FramePair`: the two frames produced by one scheduler tick, sharing a
//!   timestamp and sequence index.
//! - `ImageMessage`: the per-side view handed to a publisher.
//!
//! Frames are plain data. Decoding happens in `ingest`, stamping in the
//! scheduler, serialization in `publish`.

use serde::Serialize;

use crate::Timestamp;

/// Pixel layout of a decoded frame.
///
/// The byte order is whatever the decoding library produces; downstream
/// consumers treat the tag as an opaque contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PixelEncoding {
    /// Packed 3-channel 8-bit color, blue-green-red byte order.
    #[serde(rename = "bgr8")]
    Bgr8,
}

impl PixelEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelEncoding::Bgr8 => "bgr8",
        }
    }
}

/// One decoded image frame.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, encoding: PixelEncoding) -> Self {
        Self {
            data,
            width,
            height,
            encoding,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Which half of the stereo pair a frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StereoSide {
    Left,
    Right,
}

impl StereoSide {
    /// Channel label, also the topic path segment ("left" / "right").
    pub fn label(&self) -> &'static str {
        match self {
            StereoSide::Left => "left",
            StereoSide::Right => "right",
        }
    }

    /// Fixed source label attached to every message on this side.
    pub fn frame_id(&self) -> &'static str {
        match self {
            StereoSide::Left => "left_camera",
            StereoSide::Right => "right_camera",
        }
    }
}

/// The synchronized pair produced by one tick.
///
/// Both frames carry exactly the same `stamp` and `sequence`. A pair only
/// lives for the duration of the tick that built it.
#[derive(Debug)]
pub struct FramePair {
    pub sequence: u64,
    pub stamp: Timestamp,
    pub left: VideoFrame,
    pub right: VideoFrame,
}

impl FramePair {
    pub fn new(sequence: u64, stamp: Timestamp, left: VideoFrame, right: VideoFrame) -> Self {
        Self {
            sequence,
            stamp,
            left,
            right,
        }
    }

    /// Borrow one side as the message a publisher receives.
    pub fn message(&self, side: StereoSide) -> ImageMessage<'_> {
        let frame = match side {
            StereoSide::Left => &self.left,
            StereoSide::Right => &self.right,
        };
        ImageMessage {
            sequence: self.sequence,
            stamp: self.stamp,
            frame_id: side.frame_id(),
            frame,
        }
    }
}

/// One side of a pair, ready for a publisher.
#[derive(Clone, Copy, Debug)]
pub struct ImageMessage<'a> {
    pub sequence: u64,
    pub stamp: Timestamp,
    pub frame_id: &'a str,
    pub frame: &'a VideoFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(fill: u8) -> VideoFrame {
        VideoFrame::new(vec![fill; 2 * 2 * 3], 2, 2, PixelEncoding::Bgr8)
    }

    #[test]
    fn pair_sides_share_stamp_and_sequence() {
        let pair = FramePair::new(7, Timestamp::from_millis(1_234), test_frame(1), test_frame(2));

        let left = pair.message(StereoSide::Left);
        let right = pair.message(StereoSide::Right);

        assert_eq!(left.sequence, right.sequence);
        assert_eq!(left.stamp, right.stamp);
        assert_ne!(left.frame_id, right.frame_id);
        assert_eq!(left.frame_id, "left_camera");
        assert_eq!(right.frame_id, "right_camera");
    }

    #[test]
    fn message_borrows_the_matching_side() {
        let pair = FramePair::new(0, Timestamp::from_millis(0), test_frame(1), test_frame(2));

        assert_eq!(pair.message(StereoSide::Left).frame.data[0], 1);
        assert_eq!(pair.message(StereoSide::Right).frame.data[0], 2);
    }

    #[test]
    fn encoding_tag_is_bgr8() {
        assert_eq!(PixelEncoding::Bgr8.as_str(), "bgr8");
    }
}
