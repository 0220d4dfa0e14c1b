//! FFmpeg implementation of the codec collaborators

mod sink;
mod source;

pub use sink::FfmpegSink;
pub use source::FfmpegSource;

use crate::codec::{FrameSize, MediaBackend, SinkConfig, VideoFrame};
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

pub(crate) use ffmpeg::util::error::EAGAIN;

pub(crate) fn init() -> Result<()> {
    ffmpeg::init().map_err(|e| Error::FFmpeg(format!("Failed to initialize FFmpeg: {}", e)))
}

pub(crate) fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidConfig(format!("Invalid path: {}", path.display())))
}

/// A decoded picture in the decoder's native pixel format
pub struct DecodedFrame {
    frame: ffmpeg::frame::Video,
    timestamp: f64,
}

impl DecodedFrame {
    pub fn new(frame: ffmpeg::frame::Video, timestamp: f64) -> Self {
        Self { frame, timestamp }
    }

    pub fn format(&self) -> ffmpeg::format::Pixel {
        self.frame.format()
    }

    pub fn as_video(&self) -> &ffmpeg::frame::Video {
        &self.frame
    }

    pub fn into_video(self) -> ffmpeg::frame::Video {
        self.frame
    }
}

impl VideoFrame for DecodedFrame {
    fn size(&self) -> FrameSize {
        FrameSize::new(self.frame.width(), self.frame.height())
    }

    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// Decodes with libavcodec and writes H.264 into an MP4 container
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    type Frame = DecodedFrame;
    type Source = FfmpegSource;
    type Sink = FfmpegSink;

    fn open_source(&self, path: &Path) -> Result<FfmpegSource> {
        FfmpegSource::open(path)
    }

    fn create_sink(&self, path: &Path, config: &SinkConfig) -> Result<FfmpegSink> {
        FfmpegSink::create(path, config)
    }
}
