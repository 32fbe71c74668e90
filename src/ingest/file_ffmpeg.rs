//! Local file frame source using FFmpeg.
//!
//! This module provides an FFmpeg-backed local file decoder. Frames are
//! decoded in-memory and scaled to packed BGR24 ("bgr8"). When the container
//! runs out of packets the decoder is flushed and drained, and exhaustion is
//! surfaced as `FrameRead::EndOfStream` rather than an error.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::FrameRead;
use crate::frame::{PixelEncoding, VideoFrame};

pub(crate) struct FfmpegFileSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    /// Set once the demuxer is exhausted and `send_eof` has been issued.
    flushing: bool,
}

impl std::fmt::Debug for FfmpegFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegFileSource")
            .field("stream_index", &self.stream_index)
            .field("flushing", &self.flushing)
            .finish_non_exhaustive()
    }
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::BGR24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            flushing: false,
        })
    }

    pub(crate) fn read_next(&mut self) -> Result<FrameRead> {
        loop {
            let mut decoded = ffmpeg::frame::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut bgr_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut bgr_frame)
                    .context("scale frame to BGR")?;
                let (pixels, width, height) = frame_to_pixels(&bgr_frame)?;
                return Ok(FrameRead::Frame(VideoFrame::new(
                    pixels,
                    width,
                    height,
                    PixelEncoding::Bgr8,
                )));
            }

            if self.flushing {
                // Decoder drained after EOF: the stream is exhausted.
                return Ok(FrameRead::EndOfStream);
            }

            match self.next_video_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder
                        .send_eof()
                        .context("flush ffmpeg decoder at end of file")?;
                    self.flushing = true;
                }
            }
        }
    }

    /// Position the next read at `start_index` by decoding and discarding.
    ///
    /// Exact across containers, at the cost of O(start_index) decodes during
    /// startup. Seeking past the end leaves the source exhausted, which the
    /// first scheduled read then reports.
    pub(crate) fn seek(&mut self, start_index: u64) -> Result<()> {
        for _ in 0..start_index {
            if self.read_next()?.is_end_of_stream() {
                break;
            }
        }
        Ok(())
    }

    fn next_video_packet(&mut self) -> Option<ffmpeg::Packet> {
        for (stream, packet) in self.input.packets() {
            if stream.index() == self.stream_index {
                return Some(packet);
            }
        }
        None
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width as u32, height as u32));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width as u32, height as u32))
}
