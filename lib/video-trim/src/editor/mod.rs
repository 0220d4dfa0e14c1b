//! Video editing operations

pub mod trim;

pub use trim::{DEFAULT_FRAME_RATE, FrameRate, TrimConfig, TrimReport, frame_budget, trim_with};

#[cfg(feature = "ffmpeg")]
pub use trim::{extract_segment, trim, trim_video};
