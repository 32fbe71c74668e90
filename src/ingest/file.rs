//! Local file frame source.
//!
//! This module provides `FileSource` for reading frames out of local video
//! files. The file source is responsible for:
//! - Opening a local video file for sequential decoding (no network access)
//! - Decoding frames in-memory, in file order
//! - Reporting exhaustion as `EndOfStream`
//!
//! Paths with a `stub://` scheme select a synthetic backend that generates a
//! bounded run of deterministic frames (`stub://name?frames=N`); any other
//! local path selects the FFmpeg backend (feature: ingest-file-ffmpeg). URL
//! schemes are rejected.

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameRead, FrameSource};
use crate::frame::{PixelEncoding, VideoFrame};

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/var/lib/stereocast/left.mp4") or a
    /// `stub://name?frames=N` synthetic path.
    pub path: String,
}

/// Local file frame source.
#[derive(Debug)]
pub struct FileSource {
    path: String,
    backend: Option<FileBackend>,
    frames_read: u64,
}

#[derive(Debug)]
enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a source for sequential decoding.
    ///
    /// Failure here is fatal to the daemon: it refuses to start with a
    /// partially-open stereo pair.
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): {}",
                config.path
            ));
        }
        let backend = if config.path.starts_with(STUB_SCHEME) {
            FileBackend::Synthetic(SyntheticFileSource::parse(&config.path)?)
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                FileBackend::Ffmpeg(
                    FfmpegFileSource::open(&config.path)
                        .with_context(|| format!("failed to open video file {}", config.path))?,
                )
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                return Err(anyhow!(
                    "opening {} requires the ingest-file-ffmpeg feature",
                    config.path
                ));
            }
        };
        log::info!("FileSource: opened {}", config.path);
        Ok(Self {
            path: config.path,
            backend: Some(backend),
            frames_read: 0,
        })
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            path: self.path.clone(),
        }
    }
}

impl FrameSource for FileSource {
    fn read_next(&mut self) -> Result<FrameRead> {
        let Some(backend) = self.backend.as_mut() else {
            // Closed sources have nothing left to give.
            return Ok(FrameRead::EndOfStream);
        };
        let read = match backend {
            FileBackend::Synthetic(source) => source.read_next(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.read_next()?,
        };
        if matches!(read, FrameRead::Frame(_)) {
            self.frames_read += 1;
        }
        Ok(read)
    }

    fn seek(&mut self, start_index: u64) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(anyhow!("cannot seek a closed source: {}", self.path));
        };
        match backend {
            FileBackend::Synthetic(source) => {
                source.seek(start_index);
                Ok(())
            }
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.seek(start_index),
        }
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            log::info!("FileSource: closed {}", self.path);
        }
    }

    fn descriptor(&self) -> &str {
        &self.path
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_read: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

const STUB_SCHEME: &str = "stub://";
const STUB_WIDTH: u32 = 640;
const STUB_HEIGHT: u32 = 480;

#[derive(Debug)]
struct SyntheticFileSource {
    /// Total frames this source will produce; `None` means unbounded.
    frame_budget: Option<u64>,
    cursor: u64,
}

impl SyntheticFileSource {
    /// Parse a `stub://name?frames=N` path. Without a `frames` parameter the
    /// source is unbounded.
    fn parse(path: &str) -> Result<Self> {
        let rest = &path[STUB_SCHEME.len()..];
        let mut frame_budget = None;
        if let Some((_, query)) = rest.split_once('?') {
            for param in query.split('&') {
                if let Some(value) = param.strip_prefix("frames=") {
                    let frames: u64 = value
                        .parse()
                        .with_context(|| format!("invalid frames parameter in {}", path))?;
                    frame_budget = Some(frames);
                }
            }
        }
        Ok(Self {
            frame_budget,
            cursor: 0,
        })
    }

    fn read_next(&mut self) -> FrameRead {
        if let Some(budget) = self.frame_budget {
            if self.cursor >= budget {
                return FrameRead::EndOfStream;
            }
        }
        let frame = self.generate_frame();
        self.cursor += 1;
        FrameRead::Frame(frame)
    }

    fn seek(&mut self, start_index: u64) {
        self.cursor = start_index;
    }

    /// Generate deterministic pixel data keyed on the cursor, so consecutive
    /// frames differ and tests can tell them apart.
    fn generate_frame(&self) -> VideoFrame {
        let pixel_count = (STUB_WIDTH * STUB_HEIGHT * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.cursor) % 256) as u8;
        }
        VideoFrame::new(pixels, STUB_WIDTH, STUB_HEIGHT, PixelEncoding::Bgr8)
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
