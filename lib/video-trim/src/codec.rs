//! Decoder and encoder collaborators used by the trimmer.
//!
//! A [`MediaBackend`] opens a [`FrameSource`] for the input file and creates a
//! [`FrameSink`] for the output file. Frames travel from source to sink in the
//! representation the source decoded them in.

use crate::{Error, Result};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

/// Pixel dimensions of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

pub trait VideoFrame {
    fn size(&self) -> FrameSize;

    /// Presentation time in seconds, relative to the start of the source
    fn timestamp(&self) -> f64;
}

/// Decoding side of a trim.
pub trait FrameSource {
    type Frame: VideoFrame;

    /// Position the cursor so the next pulled frame is the one shown at
    /// `seconds`, decoding forward from the preceding keyframe as needed.
    fn seek_precise(&mut self, seconds: f64) -> Result<()>;

    /// Next decoded frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Native frame rate reported by the container, if any.
    fn frame_rate(&self) -> Option<f64>;

    /// Release the input. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Encoding side of a trim.
pub trait FrameSink<F> {
    /// Takes ownership of the frame.
    fn encode_frame(&mut self, frame: F) -> Result<()>;

    /// Flush pending packets and write the container trailer.
    fn finish(self) -> Result<()>;
}

pub trait MediaBackend {
    type Frame: VideoFrame;
    type Source: FrameSource<Frame = Self::Frame>;
    type Sink: FrameSink<Self::Frame>;

    fn open_source(&self, path: &Path) -> Result<Self::Source>;
    fn create_sink(&self, path: &Path, config: &SinkConfig) -> Result<Self::Sink>;
}

/// H.264 压缩预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum H264Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl H264Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            H264Preset::Ultrafast => "ultrafast",
            H264Preset::Superfast => "superfast",
            H264Preset::Veryfast => "veryfast",
            H264Preset::Faster => "faster",
            H264Preset::Fast => "fast",
            H264Preset::Medium => "medium",
            H264Preset::Slow => "slow",
            H264Preset::Slower => "slower",
            H264Preset::Veryslow => "veryslow",
        }
    }
}

impl FromStr for H264Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let preset = match s.to_ascii_lowercase().as_str() {
            "ultrafast" => H264Preset::Ultrafast,
            "superfast" => H264Preset::Superfast,
            "veryfast" => H264Preset::Veryfast,
            "faster" => H264Preset::Faster,
            "fast" => H264Preset::Fast,
            "medium" => H264Preset::Medium,
            "slow" => H264Preset::Slow,
            "slower" => H264Preset::Slower,
            "veryslow" => H264Preset::Veryslow,
            _ => return Err(Error::InvalidConfig(format!("unknown H.264 preset `{s}`"))),
        };

        Ok(preset)
    }
}

impl fmt::Display for H264Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings handed to [`MediaBackend::create_sink`]
#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(prefix = "with_")]
pub struct SinkConfig {
    /// Encoding frame rate (fps)
    pub frame_rate: f64,
    /// Size of the first decoded frame
    pub frame_size: FrameSize,
    pub preset: H264Preset,
    /// CRF (恒定质量因子) - 范围 0-51，越小质量越高
    pub crf: Option<u8>,
    /// Target bitrate (bps), used when `crf` is `None`
    pub bitrate: u32,
}

impl SinkConfig {
    pub fn new(frame_rate: f64, frame_size: FrameSize) -> Self {
        Self {
            frame_rate,
            frame_size,
            preset: H264Preset::default(),
            crf: Some(23),
            bitrate: 2_000_000,
        }
    }
}
