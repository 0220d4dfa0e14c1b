//! Video trim/cut example
//!
//! cargo run -p video-trim --features ffmpeg --example trim_demo -- data/test.mp4

use std::path::Path;
use video_trim::metadata::get_metadata;
use video_trim::{FrameRate, TrimConfig, extract_segment, trim_video};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let input_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/test.mp4".to_string());

    if !Path::new(&input_file).exists() {
        println!("Input file not found: {}", input_file);
        return Ok(());
    }

    std::fs::create_dir_all("tmp")?;

    let metadata = get_metadata(&input_file)?;
    println!(
        "Source: {:.2}s, {}x{}, {:?} fps",
        metadata.duration, metadata.width, metadata.height, metadata.frame_rate
    );

    // First 2 seconds at the default 25 fps
    let report = trim_video(TrimConfig::new(&input_file, "tmp/trim_first_2s.mp4", 0.0, 2.0))?;
    println!("[1] 0s-2s: {} frames", report.frames_written);

    // 1s to 3s at the source's own rate
    let config = TrimConfig::new(&input_file, "tmp/trim_1_to_3s.mp4", 1.0, 3.0)
        .with_frame_rate(FrameRate::Detect { fallback: 25.0 });
    let report = trim_video(config)?;
    println!(
        "[2] 1s-3s: {} frames at {} fps",
        report.frames_written, report.frame_rate
    );

    // From 2s to the end
    let start = 2.0;
    let report = extract_segment(
        &input_file,
        "tmp/trim_from_2s.mp4",
        start,
        metadata.duration - start,
    )?;
    println!("[3] 2s-end: {} frames", report.frames_written);

    Ok(())
}
