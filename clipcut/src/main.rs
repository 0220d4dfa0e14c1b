//! Command line front end for `video-trim`.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use video_trim::{FrameRate, H264Preset, TrimConfig, metadata::get_metadata, trim_video};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cut [start, end) seconds of INPUT into OUTPUT
    Trim {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long)]
        start: f64,

        #[arg(short, long)]
        end: f64,

        /// Output frame rate
        #[arg(long, conflicts_with = "detect_fps")]
        fps: Option<f64>,

        /// Use the input's frame rate
        #[arg(long)]
        detect_fps: bool,

        #[arg(long)]
        preset: Option<H264Preset>,

        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=51))]
        crf: Option<u8>,
    },

    /// Show duration, frame rate and size of INPUT
    Probe { input: PathBuf },
}

fn init_logger(verbose: bool) {
    use std::io::Write;

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            let ts = chrono::Local::now().format("%H:%M:%S");

            writeln!(
                buf,
                "[{} {style}{}{style:#} {} {}] {}",
                ts,
                record.level(),
                record
                    .file()
                    .unwrap_or("None")
                    .split('/')
                    .next_back()
                    .unwrap_or("None"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let conf = Config::load(cli.config.as_deref()).with_context(|| "load config file failed")?;

    match cli.command {
        Command::Trim {
            input,
            output,
            start,
            end,
            fps,
            detect_fps,
            preset,
            crf,
        } => {
            let mut config = conf.apply(TrimConfig::new(&input, &output, start, end));

            if let Some(fps) = fps {
                config = config.with_frame_rate(FrameRate::Fixed(fps));
            } else if detect_fps {
                config = config.with_frame_rate(FrameRate::Detect {
                    fallback: conf.trim.frame_rate,
                });
            }
            if let Some(preset) = preset {
                config = config.with_preset(preset);
            }
            if crf.is_some() {
                config = config.with_crf(crf);
            }

            let report = trim_video(config)
                .with_context(|| format!("trim {} failed", input.display()))?;

            if report.output_created {
                log::info!(
                    "Video cut completed: {} ({} frames at {} fps)",
                    output.display(),
                    report.frames_written,
                    report.frame_rate
                );
            } else {
                log::warn!("No frames between {start}s and {end}s, nothing written");
            }
        }
        Command::Probe { input } => {
            let metadata = get_metadata(&input)
                .with_context(|| format!("probe {} failed", input.display()))?;

            println!("path:       {}", metadata.path);
            println!("format:     {}", metadata.format_name);
            println!("duration:   {:.3}s", metadata.duration);
            println!("size:       {}x{}", metadata.width, metadata.height);
            match metadata.frame_rate {
                Some(rate) => println!("frame rate: {rate:.3} fps"),
                None => println!("frame rate: unknown"),
            }
            if let Some(frames) = metadata.estimated_frames() {
                println!("frames:     ~{frames}");
            }
            println!("bitrate:    {} bps", metadata.bitrate);
            println!(
                "streams:    {} video, {} audio",
                metadata.video_streams_count, metadata.audio_streams_count
            );
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(cli) {
        log::error!("{e:?}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_trim() {
        let cli = Cli::try_parse_from([
            "clipcut", "trim", "in.mp4", "out.mp4", "--start", "5", "--end", "15", "--preset", "fast",
        ])
        .unwrap();

        match cli.command {
            Command::Trim {
                start,
                end,
                preset,
                fps,
                ..
            } => {
                assert_eq!((start, end), (5.0, 15.0));
                assert_eq!(preset, Some(H264Preset::Fast));
                assert_eq!(fps, None);
            }
            _ => panic!("expected trim"),
        }
    }

    #[test]
    fn test_fps_conflicts_with_detect() {
        let result = Cli::try_parse_from([
            "clipcut", "trim", "a.mp4", "b.mp4", "-s", "0", "-e", "1", "--fps", "30", "--detect-fps",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_crf_range() {
        let result = Cli::try_parse_from([
            "clipcut", "trim", "a.mp4", "b.mp4", "-s", "0", "-e", "1", "--crf", "60",
        ]);
        assert!(result.is_err());
    }
}
