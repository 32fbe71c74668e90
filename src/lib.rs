//! Stereocast
//!
//! This crate replays a pre-recorded stereo pair (left/right video files) onto
//! two image channels at a fixed rate.
//!
//! # Architecture
//!
//! One timer-driven scheduler owns two frame sources and two publishers. Each
//! tick pulls one frame from each source, stamps both with the same wall-clock
//! instant and sequence index, and forwards each side to its channel. When
//! either source runs out of frames the scheduler stops, closes both sources,
//! and the host loop tears down. There is no resume and no retry: end of
//! stream is the normal way this process ends.
//!
//! # Module Structure
//!
//! - `frame`: frame types (`VideoFrame`, `FramePair`, `ImageMessage`)
//! - `ingest`: frame sources (local video files, synthetic stubs)
//! - `publish`: frame publishers (MQTT, in-memory)
//! - `scheduler`: the dual-stream tick scheduler
//! - `config`: validated startup configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod frame;
pub mod ingest;
pub mod publish;
pub mod scheduler;

pub use config::{ConfigOverrides, MqttSettings, StereocastConfig};
pub use frame::{FramePair, ImageMessage, PixelEncoding, StereoSide, VideoFrame};
pub use ingest::{file::FileConfig, FileSource, FrameRead, FrameSource};
pub use publish::{
    FramePublisher, MemoryPublisher, MqttFramePublisher, MqttRuntime, PublishOutcome,
    PublishedFrame,
};
pub use scheduler::{DualStreamScheduler, ScheduleSettings, SchedulerPhase, TickOutcome};

// -------------------- Timestamps --------------------

/// Wall-clock instant attached to every published frame, in milliseconds since
/// the Unix epoch. Both sides of a frame pair carry the exact same value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub epoch_ms: u64,
}

impl Timestamp {
    pub fn now() -> Result<Self> {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH)?;
        Ok(Self {
            epoch_ms: elapsed.as_millis() as u64,
        })
    }

    pub fn from_millis(epoch_ms: u64) -> Self {
        Self { epoch_ms }
    }

    pub fn as_millis(&self) -> u64 {
        self.epoch_ms
    }
}
