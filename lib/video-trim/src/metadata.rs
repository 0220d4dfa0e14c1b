use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

/// Video file metadata
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    /// File path
    pub path: String,

    /// Format name (e.g., "mov,mp4,m4a,3gp,3g2,mj2")
    pub format_name: String,

    /// Duration in seconds
    pub duration: f64,

    /// Total bitrate in bits per second
    pub bitrate: u64,

    /// File size in bytes
    pub size: u64,

    /// Average frame rate of the best video stream
    pub frame_rate: Option<f64>,

    pub width: u32,
    pub height: u32,

    /// Video streams count
    pub video_streams_count: usize,

    /// Audio streams count
    pub audio_streams_count: usize,
}

impl VideoMetadata {
    /// Frames expected at the reported rate, if the rate is known
    pub fn estimated_frames(&self) -> Option<u64> {
        self.frame_rate
            .map(|rate| crate::frame_budget(self.duration, rate))
    }
}

/// Get metadata for a video file
pub fn get_metadata<P: AsRef<Path>>(path: P) -> Result<VideoMetadata> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_string();

    if !path.exists() {
        return Err(Error::IO(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path_str),
        )));
    }

    let size = std::fs::metadata(path)?.len();

    crate::ffmpeg::init()?;

    let input_ctx = ffmpeg::format::input(&path_str)
        .map_err(|e| Error::FFmpeg(format!("Failed to open input file: {}", e)))?;

    let format_name = input_ctx.format().name().to_string();
    let duration = input_ctx.duration() as f64 / f64::from(ffmpeg::sys::AV_TIME_BASE);
    let bitrate = input_ctx.bit_rate() as u64;

    let count = |kind: ffmpeg::media::Type| {
        input_ctx
            .streams()
            .filter(|s| s.parameters().medium() == kind)
            .count()
    };
    let video_streams_count = count(ffmpeg::media::Type::Video);
    let audio_streams_count = count(ffmpeg::media::Type::Audio);

    let (frame_rate, width, height) = match input_ctx.streams().best(ffmpeg::media::Type::Video) {
        Some(stream) => {
            let rate = stream.avg_frame_rate();
            let frame_rate = (rate.numerator() > 0 && rate.denominator() > 0).then(|| f64::from(rate));

            let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|ctx| ctx.decoder().video())
                .map_err(|e| Error::FFmpeg(format!("Failed to read video parameters: {}", e)))?;

            (frame_rate, decoder.width(), decoder.height())
        }
        None => (None, 0, 0),
    };

    Ok(VideoMetadata {
        path: path_str,
        format_name,
        duration,
        bitrate,
        size,
        frame_rate,
        width,
        height,
        video_streams_count,
        audio_streams_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_metadata_missing_file() {
        let err = get_metadata("/definitely/not/here.mp4").unwrap_err();
        assert!(matches!(err, Error::IO(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_estimated_frames() {
        let metadata = VideoMetadata {
            path: "a.mp4".to_string(),
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration: 30.0,
            bitrate: 0,
            size: 0,
            frame_rate: Some(25.0),
            width: 640,
            height: 360,
            video_streams_count: 1,
            audio_streams_count: 0,
        };
        assert_eq!(metadata.estimated_frames(), Some(750));
        assert_eq!(
            VideoMetadata {
                frame_rate: None,
                ..metadata
            }
            .estimated_frames(),
            None
        );
    }
}
