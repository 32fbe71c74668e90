//! Frame ingestion sources.
//!
//! This module provides sequential sources of decoded frames:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Stub sources (`stub://` paths, testing)
//!
//! All sources produce `VideoFrame` instances that flow into the scheduler.
//! The ingestion layer is responsible for:
//! - Decoding frames in-memory, in file order
//! - Reporting exhaustion as `FrameRead::EndOfStream`, never as an error
//! - One best-effort seek to the configured start frame, before the first read
//!
//! A source's position only moves forward after that initial seek. Closing a
//! source is idempotent; reads after close report end-of-stream.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::FileSource;

use anyhow::Result;

use crate::frame::VideoFrame;

/// Result of pulling on a source.
///
/// End of stream is a first-class value: it is how a finite source is expected
/// to end, and it is the scheduler's sole normal termination trigger.
#[derive(Debug)]
pub enum FrameRead {
    Frame(VideoFrame),
    EndOfStream,
}

impl FrameRead {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameRead::EndOfStream)
    }
}

/// A sequential source of decoded frames.
pub trait FrameSource {
    /// Pull the next frame, or `EndOfStream` once the source is exhausted.
    ///
    /// Errors are reserved for decode failures mid-stream; exhaustion is not
    /// an error.
    fn read_next(&mut self) -> Result<FrameRead>;

    /// Best-effort positioning of the next read at `start_index`.
    ///
    /// Called at most once, before the first read. A source that cannot seek
    /// may return an error; the caller continues from frame 0.
    fn seek(&mut self, start_index: u64) -> Result<()>;

    /// Release the underlying decoding resource. Idempotent.
    fn close(&mut self);

    /// Identity of the source for diagnostics (the configured path).
    fn descriptor(&self) -> &str;
}
