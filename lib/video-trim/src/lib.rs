//! Cut a time range out of a video by decoding the frames inside the range
//! and re-encoding them into a new MP4 container.
//!
//! The trimming procedure in [`editor::trim`] is generic over a
//! [`MediaBackend`], so the codec is a collaborator rather than a dependency
//! of the algorithm. The `ffmpeg` feature enables the production backend.

pub mod codec;
pub mod editor;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(feature = "ffmpeg")]
pub mod metadata;

pub use codec::{FrameSink, FrameSize, FrameSource, H264Preset, MediaBackend, SinkConfig, VideoFrame};
pub use editor::{FrameRate, TrimConfig, TrimReport, frame_budget, trim_with};

#[cfg(feature = "ffmpeg")]
pub use editor::{extract_segment, trim, trim_video};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO Error {0}")]
    IO(#[from] std::io::Error),

    #[error("FFmpeg Error: {0}")]
    FFmpeg(String),

    #[error("Invalid time range: start={start}s end={end}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Failures raised while reading, decoding, encoding or writing media,
    /// as opposed to a request rejected before anything was opened.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Error::IO(_) | Error::FFmpeg(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io.is_io_failure());
        assert!(Error::FFmpeg("write trailer".to_string()).is_io_failure());
        assert!(!Error::InvalidRange { start: 2.0, end: 1.0 }.is_io_failure());
        assert!(!Error::InvalidFrameRate(0.0).is_io_failure());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidRange { start: 5.0, end: 1.5 };
        assert_eq!(err.to_string(), "Invalid time range: start=5s end=1.5s");
    }
}
