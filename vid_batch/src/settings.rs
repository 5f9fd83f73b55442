//! Conversion settings
//!
//! `ConversionSettings` is the frozen snapshot a batch runs under. The platform
//! tag is resolved once when the snapshot is built and never re-evaluated per job.

use serde::Serialize;
use shared_utils::VidBatchError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════
// Frame rate
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FrameRate {
    #[serde(rename = "24")]
    Fps24,
    #[serde(rename = "30")]
    Fps30,
}

impl FrameRate {
    pub const ALL: [FrameRate; 2] = [FrameRate::Fps24, FrameRate::Fps30];

    pub fn value(self) -> u32 {
        match self {
            FrameRate::Fps24 => 24,
            FrameRate::Fps30 => 30,
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::Fps30
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = VidBatchError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            24 => Ok(FrameRate::Fps24),
            30 => Ok(FrameRate::Fps30),
            other => Err(VidBatchError::InvalidFrameRate(other.to_string())),
        }
    }
}

impl FromStr for FrameRate {
    type Err = VidBatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches("fps");
        trimmed
            .parse::<u32>()
            .map_err(|_| VidBatchError::InvalidFrameRate(s.to_string()))
            .and_then(FrameRate::try_from)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

// ═══════════════════════════════════════════════════════════════
// Resolution
// ═══════════════════════════════════════════════════════════════

/// Target vertical resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Resolution {
    #[serde(rename = "360")]
    P360,
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "1080")]
    P1080,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::P360,
        Resolution::P480,
        Resolution::P720,
        Resolution::P1080,
    ];

    pub fn height(self) -> u32 {
        match self {
            Resolution::P360 => 360,
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::P360
    }
}

impl TryFrom<u32> for Resolution {
    type Error = VidBatchError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            360 => Ok(Resolution::P360),
            480 => Ok(Resolution::P480),
            720 => Ok(Resolution::P720),
            1080 => Ok(Resolution::P1080),
            other => Err(VidBatchError::InvalidResolution(other.to_string())),
        }
    }
}

impl FromStr for Resolution {
    type Err = VidBatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('p');
        trimmed
            .parse::<u32>()
            .map_err(|_| VidBatchError::InvalidResolution(s.to_string()))
            .and_then(Resolution::try_from)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.height())
    }
}

// ═══════════════════════════════════════════════════════════════
// Platform tag
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
            Platform::Other => "other",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════════════════════════
// Settings snapshot
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSettings {
    pub fps: FrameRate,
    pub resolution: Resolution,
    pub output_dir: PathBuf,
    pub platform: Platform,
}

impl ConversionSettings {
    pub fn new(fps: FrameRate, resolution: Resolution, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fps,
            resolution,
            output_dir: output_dir.into(),
            platform: Platform::current(),
        }
    }

    /// Pin the platform tag, used by `plan` and by tests.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// One-line description used in the batch-start log.
    pub fn describe(&self, file_count: usize) -> String {
        format!(
            "{} files, {}p, {}fps",
            file_count, self.resolution, self.fps
        )
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self::new(FrameRate::default(), Resolution::default(), default_output_dir())
    }
}

/// `~/Downloads`, or the current directory when no home directory is known.
pub fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_parsing() {
        assert_eq!("24".parse::<FrameRate>().unwrap(), FrameRate::Fps24);
        assert_eq!("30fps".parse::<FrameRate>().unwrap(), FrameRate::Fps30);
        assert!(matches!(
            "25".parse::<FrameRate>(),
            Err(VidBatchError::InvalidFrameRate(_))
        ));
        assert!("abc".parse::<FrameRate>().is_err());
        assert_eq!(FrameRate::default().value(), 30);
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("1080".parse::<Resolution>().unwrap(), Resolution::P1080);
        assert_eq!("480p".parse::<Resolution>().unwrap(), Resolution::P480);
        assert!(matches!(
            Resolution::try_from(540),
            Err(VidBatchError::InvalidResolution(_))
        ));
        assert_eq!(Resolution::default().height(), 360);
    }

    #[test]
    fn test_resolution_ordering_follows_height() {
        let mut sorted = Resolution::ALL;
        sorted.sort();
        let heights: Vec<u32> = sorted.iter().map(|r| r.height()).collect();
        assert_eq!(heights, vec![360, 480, 720, 1080]);
    }

    #[test]
    fn test_settings_describe_and_platform_pin() {
        let s = ConversionSettings::new(FrameRate::Fps24, Resolution::P720, "/out")
            .with_platform(Platform::Windows);
        assert_eq!(s.platform, Platform::Windows);
        assert_eq!(s.describe(3), "3 files, 720p, 24fps");
        assert_eq!(s.output_dir(), Path::new("/out"));
    }

    #[test]
    fn test_settings_serialize_as_numbers() {
        let s = ConversionSettings::new(FrameRate::Fps30, Resolution::P480, "out")
            .with_platform(Platform::Linux);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains(r#""fps":"30""#), "{}", json);
        assert!(json.contains(r#""resolution":"480""#), "{}", json);
        assert!(json.contains(r#""platform":"linux""#), "{}", json);
    }

    #[test]
    fn test_default_output_dir_is_downloads_or_cwd() {
        let dir = default_output_dir();
        assert!(dir.ends_with("Downloads") || dir == Path::new("."));
    }
}
