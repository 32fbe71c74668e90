//! Frame publishers.
//!
//! This module provides sinks for stamped frames:
//! - MQTT channels (`MqttFramePublisher`, the production transport)
//! - In-memory recording (`MemoryPublisher`, testing and embedding)
//!
//! A publisher is a side-effect boundary only. It must not block the scheduler
//! beyond a bounded, short enqueue: a sink under backpressure reports the
//! frame as dropped instead of stalling the tick. Publish failures are the
//! caller's to log; they never abort the stream.

pub mod mqtt;

pub use mqtt::{MqttFramePublisher, MqttRuntime};

use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::frame::ImageMessage;
use crate::Timestamp;

/// What became of one publish attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The sink accepted the frame for delivery.
    Accepted,
    /// The sink was saturated; the frame was discarded (reject-newest).
    Dropped,
}

/// A sink accepting stamped, labeled frames for one channel.
pub trait FramePublisher {
    /// Enqueue a frame for delivery. Bounded wait only.
    fn publish(&mut self, message: &ImageMessage<'_>) -> Result<PublishOutcome>;

    /// Channel label for diagnostics ("left" / "right").
    fn channel(&self) -> &str;
}

// ----------------------------------------------------------------------------
// In-memory publisher
// ----------------------------------------------------------------------------

/// Record of one published frame, kept by `MemoryPublisher`.
#[derive(Clone, Debug)]
pub struct PublishedFrame {
    pub sequence: u64,
    pub stamp: Timestamp,
    pub frame_id: String,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
}

/// In-memory publisher recording everything it accepts.
///
/// The record log is shared: clone the handle from `log()` before handing the
/// publisher to a scheduler, then inspect it after the run.
pub struct MemoryPublisher {
    channel: String,
    log: Arc<Mutex<Vec<PublishedFrame>>>,
    saturated: bool,
}

impl MemoryPublisher {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            log: Arc::new(Mutex::new(Vec::new())),
            saturated: false,
        }
    }

    /// A publisher that drops every frame, for degraded-sink tests.
    pub fn saturated(channel: &str) -> Self {
        Self {
            saturated: true,
            ..Self::new(channel)
        }
    }

    pub fn log(&self) -> Arc<Mutex<Vec<PublishedFrame>>> {
        Arc::clone(&self.log)
    }
}

impl FramePublisher for MemoryPublisher {
    fn publish(&mut self, message: &ImageMessage<'_>) -> Result<PublishOutcome> {
        if self.saturated {
            return Ok(PublishOutcome::Dropped);
        }
        let record = PublishedFrame {
            sequence: message.sequence,
            stamp: message.stamp,
            frame_id: message.frame_id.to_string(),
            width: message.frame.width,
            height: message.frame.height,
            byte_len: message.frame.byte_len(),
        };
        self.log
            .lock()
            .map_err(|_| anyhow::anyhow!("publisher log poisoned"))?
            .push(record);
        Ok(PublishOutcome::Accepted)
    }

    fn channel(&self) -> &str {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PixelEncoding, VideoFrame};

    fn test_message(frame: &VideoFrame) -> ImageMessage<'_> {
        ImageMessage {
            sequence: 3,
            stamp: Timestamp::from_millis(5_000),
            frame_id: "left_camera",
            frame,
        }
    }

    #[test]
    fn memory_publisher_records_accepted_frames() -> Result<()> {
        let frame = VideoFrame::new(vec![0u8; 12], 2, 2, PixelEncoding::Bgr8);
        let mut publisher = MemoryPublisher::new("left");
        let log = publisher.log();

        let outcome = publisher.publish(&test_message(&frame))?;

        assert_eq!(outcome, PublishOutcome::Accepted);
        let records = log.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, 3);
        assert_eq!(records[0].frame_id, "left_camera");
        assert_eq!(records[0].byte_len, 12);

        Ok(())
    }

    #[test]
    fn saturated_publisher_drops_without_recording() -> Result<()> {
        let frame = VideoFrame::new(vec![0u8; 12], 2, 2, PixelEncoding::Bgr8);
        let mut publisher = MemoryPublisher::saturated("right");
        let log = publisher.log();

        let outcome = publisher.publish(&test_message(&frame))?;

        assert_eq!(outcome, PublishOutcome::Dropped);
        assert!(log.lock().unwrap().is_empty());

        Ok(())
    }
}
