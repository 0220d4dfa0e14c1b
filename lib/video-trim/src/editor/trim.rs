//! Video trimming/cutting functionality
//!
//! Extracts the frames between a start and an end timestamp and re-encodes
//! them into a new file. The frame count is bounded by a budget derived from
//! the requested duration and the encoding frame rate, and the output file is
//! only created once the first frame in range has been decoded.

use crate::codec::{FrameSink, FrameSize, FrameSource, H264Preset, MediaBackend, SinkConfig, VideoFrame};
use crate::{Error, Result};
use derivative::Derivative;
use derive_setters::Setters;
use std::path::PathBuf;

pub const DEFAULT_FRAME_RATE: f64 = 25.0;

// Absorbs rounding in products like 0.04 * 25.0.
const BUDGET_EPSILON: f64 = 1e-9;

/// Frame rate used for the frame budget and the output stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameRate {
    Fixed(f64),
    /// Use the source's native rate, or `fallback` when the source has none
    Detect { fallback: f64 },
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::Fixed(DEFAULT_FRAME_RATE)
    }
}

impl FrameRate {
    fn validate(&self) -> Result<()> {
        let rate = match *self {
            FrameRate::Fixed(rate) => rate,
            FrameRate::Detect { fallback } => fallback,
        };

        if rate.is_finite() && rate > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidFrameRate(rate))
        }
    }

    fn resolve(&self, detected: Option<f64>) -> f64 {
        match *self {
            FrameRate::Fixed(rate) => rate,
            FrameRate::Detect { fallback } => match detected {
                Some(rate) if rate.is_finite() && rate > 0.0 => rate,
                _ => {
                    log::warn!("Source reports no frame rate, falling back to {fallback} fps");
                    fallback
                }
            },
        }
    }
}

/// Configuration for video trimming operation
#[derive(Debug, Clone, Derivative, Setters)]
#[derivative(Default)]
#[setters(prefix = "with_")]
#[non_exhaustive]
pub struct TrimConfig {
    /// Path to input video file
    #[setters(into)]
    pub input: PathBuf,
    /// Path to output video file
    #[setters(into)]
    pub output: PathBuf,
    /// Start of the range in seconds
    pub start: f64,
    /// End of the range in seconds, exclusive
    pub end: f64,
    pub frame_rate: FrameRate,
    pub preset: H264Preset,
    #[derivative(Default(value = "Some(23)"))]
    pub crf: Option<u8>,
    #[derivative(Default(value = "2_000_000"))]
    pub bitrate: u32,
}

impl TrimConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        start: f64,
        end: f64,
    ) -> Self {
        Self::default()
            .with_input(input)
            .with_output(output)
            .with_start(start)
            .with_end(end)
    }

    /// Set the end time from a duration measured from `start`
    pub fn with_duration(self, duration: f64) -> Self {
        let end = self.start + duration;
        self.with_end(end)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Reject requests that cannot describe a non-empty range.
    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.end.is_finite() || self.start < 0.0 || self.end <= self.start {
            return Err(Error::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }

        self.frame_rate.validate()?;

        if let Some(crf) = self.crf
            && crf > 51
        {
            return Err(Error::InvalidConfig(format!("crf must be in 0..=51, got {crf}")));
        }

        if self.input.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("input and output paths are required".to_string()));
        }

        if self.input == self.output {
            return Err(Error::InvalidConfig(format!(
                "output would overwrite input {}",
                self.input.display()
            )));
        }

        Ok(())
    }

    fn sink_config(&self, frame_rate: f64, frame_size: FrameSize) -> SinkConfig {
        SinkConfig::new(frame_rate, frame_size)
            .with_preset(self.preset)
            .with_crf(self.crf)
            .with_bitrate(self.bitrate)
    }
}

/// Outcome of a successful trim
#[derive(Debug, Clone, PartialEq)]
pub struct TrimReport {
    pub frames_written: u64,
    pub frame_budget: u64,
    pub frame_rate: f64,
    /// `false` when no frame fell inside the range
    pub output_created: bool,
    pub frame_size: Option<FrameSize>,
}

/// Maximum number of frames emitted for `duration` seconds at `frame_rate`.
pub fn frame_budget(duration: f64, frame_rate: f64) -> u64 {
    if !(duration > 0.0 && frame_rate > 0.0) {
        return 0;
    }

    (duration * frame_rate + BUDGET_EPSILON).floor() as u64
}

/// Closes the source when dropped, unless [`SourceGuard::close`] already did.
struct SourceGuard<S: FrameSource> {
    source: S,
    closed: bool,
}

impl<S: FrameSource> SourceGuard<S> {
    fn new(source: S) -> Self {
        Self {
            source,
            closed: false,
        }
    }

    fn close(mut self) -> Result<()> {
        self.closed = true;
        self.source.close()
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.source.close()
        {
            log::warn!("Failed to close input: {e}");
        }
    }
}

/// Trim a video using the given codec backend
///
/// The input is closed exactly once whether the trim succeeds or fails. The
/// output is created on the first decoded frame in range, so a range holding
/// no frames leaves no file behind.
pub fn trim_with<B: MediaBackend>(backend: &B, config: &TrimConfig) -> Result<TrimReport> {
    config.validate()?;

    log::info!(
        "Trimming {} [{:.3}s, {:.3}s) -> {}",
        config.input.display(),
        config.start,
        config.end,
        config.output.display()
    );

    let mut guard = SourceGuard::new(backend.open_source(&config.input)?);
    let report = copy_range(backend, config, &mut guard.source)?;
    guard.close()?;

    log::info!(
        "Trim finished: {}/{} frames at {} fps",
        report.frames_written,
        report.frame_budget,
        report.frame_rate
    );

    Ok(report)
}

fn copy_range<B: MediaBackend>(
    backend: &B,
    config: &TrimConfig,
    source: &mut B::Source,
) -> Result<TrimReport> {
    source.seek_precise(config.start)?;

    let frame_rate = config.frame_rate.resolve(source.frame_rate());
    let budget = frame_budget(config.duration(), frame_rate);
    log::debug!("Frame budget: {budget} frames at {frame_rate} fps");

    let mut sink: Option<B::Sink> = None;
    let mut frame_size = None;
    let mut frames_written = 0u64;

    // The budget is checked before pulling so a zero budget decodes nothing.
    while frames_written < budget {
        let Some(frame) = source.next_frame()? else {
            log::debug!("End of stream after {frames_written} frames");
            break;
        };

        let active = match &mut sink {
            Some(active) => active,
            None => {
                let size = frame.size();
                log::debug!(
                    "First frame at {:.3}s, size {size}, creating {}",
                    frame.timestamp(),
                    config.output.display()
                );

                frame_size = Some(size);
                sink.insert(backend.create_sink(&config.output, &config.sink_config(frame_rate, size))?)
            }
        };

        active.encode_frame(frame)?;

        frames_written += 1;
        if frames_written % 25 == 0 {
            log::debug!("Encoded {frames_written} frames");
        }
    }

    let output_created = match sink {
        Some(sink) => {
            sink.finish()?;
            true
        }
        None => {
            log::info!("No frames in range, {} not created", config.output.display());
            false
        }
    };

    Ok(TrimReport {
        frames_written,
        frame_budget: budget,
        frame_rate,
        output_created,
        frame_size,
    })
}

/// Trim a video to the given range with the FFmpeg backend
///
/// # Example
/// ```no_run
/// use video_trim::editor::trim::{trim_video, TrimConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Extract from 10 seconds to 30 seconds
/// let config = TrimConfig::new("input.mp4", "output.mp4", 10.0, 30.0);
/// let report = trim_video(config)?;
/// println!("wrote {} frames", report.frames_written);
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "ffmpeg")]
pub fn trim_video(config: TrimConfig) -> Result<TrimReport> {
    trim_with(&crate::ffmpeg::FfmpegBackend, &config)
}

/// Cut `[start_seconds, end_seconds)` of `input` into `output` at 25 fps.
#[cfg(feature = "ffmpeg")]
pub fn trim(
    input: impl AsRef<std::path::Path>,
    output: impl AsRef<std::path::Path>,
    start_seconds: f64,
    end_seconds: f64,
) -> Result<()> {
    let config = TrimConfig::new(
        input.as_ref(),
        output.as_ref(),
        start_seconds,
        end_seconds,
    );

    trim_video(config).map(|_| ())
}

/// Extract a segment from video (convenience function)
///
/// # Arguments
/// * `input` - Input video path
/// * `output` - Output video path
/// * `start_sec` - Start time in seconds
/// * `duration_sec` - Duration in seconds
#[cfg(feature = "ffmpeg")]
pub fn extract_segment(
    input: impl AsRef<std::path::Path>,
    output: impl AsRef<std::path::Path>,
    start_sec: f64,
    duration_sec: f64,
) -> Result<TrimReport> {
    let config = TrimConfig::new(input.as_ref(), output.as_ref(), start_sec, start_sec)
        .with_duration(duration_sec);

    trim_video(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_config_creation() {
        let config = TrimConfig::new("input.mp4", "output.mp4", 10.0, 30.0);
        assert_eq!(config.input, PathBuf::from("input.mp4"));
        assert_eq!(config.output, PathBuf::from("output.mp4"));
        assert_eq!(config.start, 10.0);
        assert_eq!(config.end, 30.0);
        assert_eq!(config.frame_rate, FrameRate::Fixed(25.0));
        assert_eq!(config.crf, Some(23));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_trim_config_with_duration() {
        let config = TrimConfig::new("input.mp4", "output.mp4", 10.0, 0.0).with_duration(20.0);
        assert_eq!(config.end, 30.0);
        assert_eq!(config.duration(), 20.0);
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        for (start, end) in [(5.0, 5.0), (15.0, 5.0), (-1.0, 5.0), (0.0, f64::NAN), (f64::INFINITY, 1.0)] {
            let config = TrimConfig::new("in.mp4", "out.mp4", start, end);
            assert!(
                matches!(config.validate(), Err(Error::InvalidRange { .. })),
                "({start}, {end}) should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let config = TrimConfig::new("in.mp4", "out.mp4", 0.0, 1.0).with_frame_rate(FrameRate::Fixed(0.0));
        assert!(matches!(config.validate(), Err(Error::InvalidFrameRate(_))));

        let config = TrimConfig::new("in.mp4", "out.mp4", 0.0, 1.0)
            .with_frame_rate(FrameRate::Detect { fallback: f64::NAN });
        assert!(matches!(config.validate(), Err(Error::InvalidFrameRate(_))));

        let config = TrimConfig::new("in.mp4", "out.mp4", 0.0, 1.0).with_crf(Some(52));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = TrimConfig::new("same.mp4", "same.mp4", 0.0, 1.0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_frame_budget() {
        assert_eq!(frame_budget(10.0, 25.0), 250);
        assert_eq!(frame_budget(0.04, 25.0), 1);
        assert_eq!(frame_budget(0.02, 25.0), 0);
        assert_eq!(frame_budget(1.0, 29.97), 29);
        assert_eq!(frame_budget(0.0, 25.0), 0);
        assert_eq!(frame_budget(-3.0, 25.0), 0);
        assert_eq!(frame_budget(f64::NAN, 25.0), 0);
    }

    #[test]
    fn test_frame_rate_resolve() {
        assert_eq!(FrameRate::Fixed(30.0).resolve(Some(60.0)), 30.0);
        assert_eq!(FrameRate::Detect { fallback: 25.0 }.resolve(Some(60.0)), 60.0);
        assert_eq!(FrameRate::Detect { fallback: 25.0 }.resolve(None), 25.0);
        assert_eq!(FrameRate::Detect { fallback: 25.0 }.resolve(Some(0.0)), 25.0);
    }
}
