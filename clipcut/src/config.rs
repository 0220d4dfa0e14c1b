use anyhow::{Context, Result};
use derivative::Derivative;
use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};
use video_trim::{FrameRate, H264Preset, TrimConfig, editor::trim::DEFAULT_FRAME_RATE};

const APP_NAME: &str = "clipcut";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub trim: Trim,

    #[serde(default)]
    pub encoder: Encoder,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Trim {
    #[derivative(Default(value = "DEFAULT_FRAME_RATE"))]
    pub frame_rate: f64,

    pub detect_frame_rate: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Encoder {
    pub preset: H264Preset,

    #[derivative(Default(value = "Some(23)"))]
    pub crf: Option<u8>,

    #[derivative(Default(value = "2_000_000"))]
    pub bitrate: u32,
}

impl Config {
    /// `<config dir>/clipcut/clipcut.toml`
    pub fn default_path() -> Option<PathBuf> {
        AppDirs::new(Some(APP_NAME), true).map(|dirs| dirs.config_dir.join(format!("{APP_NAME}.toml")))
    }

    /// Load `path`, or the default location when `path` is `None`.
    ///
    /// A missing file gives the defaults. A file that exists but does not
    /// parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("read config file {} failed", path.display()))?;
        let config = toml::from_str::<Config>(&text)
            .with_context(|| format!("parse config file {} failed", path.display()))?;

        log::debug!("{:?}", config);
        Ok(config)
    }

    pub fn frame_rate(&self) -> FrameRate {
        if self.trim.detect_frame_rate {
            FrameRate::Detect {
                fallback: self.trim.frame_rate,
            }
        } else {
            FrameRate::Fixed(self.trim.frame_rate)
        }
    }

    /// Apply the configured defaults to a trim request.
    pub fn apply(&self, config: TrimConfig) -> TrimConfig {
        config
            .with_frame_rate(self.frame_rate())
            .with_preset(self.encoder.preset)
            .with_crf(self.encoder.crf)
            .with_bitrate(self.encoder.bitrate)
    }
}
