//! Encoder parameter selection
//!
//! A pure mapping from (target resolution, platform) to the codec, profile and
//! rate-control values an encode runs with. Two codec tables exist:
//!
//! - the **direct** table feeds the ffmpeg subprocess tier: HEVC on Windows,
//!   H.264 everywhere else;
//! - the **library** table feeds the media-library tiers: H.264 on macOS,
//!   HEVC everywhere else.
//!
//! The bitrate ladder is shared by both and does not depend on the platform.

use crate::settings::{Platform, Resolution};
use serde::Serialize;
use std::fmt;

pub const LEVEL: &str = "4.1";
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "128k";
pub const PIXEL_FORMAT: &str = "yuv420p";
pub const FASTSTART: &str = "+faststart";
pub const PRESET: &str = "medium";
pub const CONTAINER_EXT: &str = "mp4";

// ═══════════════════════════════════════════════════════════════
// Codec family
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
}

impl VideoCodec {
    pub fn encoder(self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Hevc => "libx265",
        }
    }

    pub fn profile(self) -> &'static str {
        match self {
            VideoCodec::H264 => "high",
            VideoCodec::Hevc => "main",
        }
    }

    /// MP4 sample-entry tag players expect for this codec.
    pub fn tag(self) -> &'static str {
        match self {
            VideoCodec::H264 => "avc1",
            VideoCodec::Hevc => "hvc1",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder())
    }
}

/// Codec for the ffmpeg subprocess tier.
pub fn direct_codec(platform: Platform) -> VideoCodec {
    match platform {
        Platform::Windows => VideoCodec::Hevc,
        _ => VideoCodec::H264,
    }
}

/// Codec for the media-library tiers.
pub fn library_codec(platform: Platform) -> VideoCodec {
    match platform {
        Platform::MacOs => VideoCodec::H264,
        _ => VideoCodec::Hevc,
    }
}

// ═══════════════════════════════════════════════════════════════
// Bitrate ladder
// ═══════════════════════════════════════════════════════════════

/// A rate in kbit/s together with the exact string handed to ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub kbps: u32,
    pub arg: &'static str,
}

impl Rate {
    const fn new(kbps: u32, arg: &'static str) -> Self {
        Self { kbps, arg }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateControl {
    pub bitrate: Rate,
    pub maxrate: Rate,
    pub bufsize: Rate,
    pub crf: u8,
}

pub fn ladder(resolution: Resolution) -> RateControl {
    match resolution {
        Resolution::P1080 => RateControl {
            bitrate: Rate::new(2500, "2.5M"),
            maxrate: Rate::new(2750, "2.75M"),
            bufsize: Rate::new(5000, "5M"),
            crf: 24,
        },
        Resolution::P720 => RateControl {
            bitrate: Rate::new(1800, "1.8M"),
            maxrate: Rate::new(2000, "2.0M"),
            bufsize: Rate::new(3600, "3.6M"),
            crf: 24,
        },
        Resolution::P480 => RateControl {
            bitrate: Rate::new(1000, "1.0M"),
            maxrate: Rate::new(1200, "1.2M"),
            bufsize: Rate::new(2000, "2.0M"),
            crf: 24,
        },
        Resolution::P360 => RateControl {
            bitrate: Rate::new(300, "0.3M"),
            maxrate: Rate::new(400, "0.4M"),
            bufsize: Rate::new(800, "0.8M"),
            crf: 26,
        },
    }
}

// ═══════════════════════════════════════════════════════════════
// Parameter profile
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParameterProfile {
    pub codec: VideoCodec,
    pub profile: &'static str,
    pub level: &'static str,
    /// `-tag:v` value; only set for HEVC, whose default tag Apple players reject
    pub tag: Option<&'static str>,
    pub rate: RateControl,
}

impl ParameterProfile {
    fn for_codec(codec: VideoCodec, resolution: Resolution) -> Self {
        Self {
            codec,
            profile: codec.profile(),
            level: LEVEL,
            tag: (codec == VideoCodec::Hevc).then(|| codec.tag()),
            rate: ladder(resolution),
        }
    }

    /// `-profile:v … -level:v … -b:v … -maxrate … -bufsize …`, plus `-tag:v` when set.
    pub fn tuning_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(12);
        if let Some(tag) = self.tag {
            args.extend(["-tag:v".to_string(), tag.to_string()]);
        }
        args.extend([
            "-profile:v".to_string(),
            self.profile.to_string(),
            "-level:v".to_string(),
            self.level.to_string(),
            "-b:v".to_string(),
            self.rate.bitrate.arg.to_string(),
            "-maxrate".to_string(),
            self.rate.maxrate.arg.to_string(),
            "-bufsize".to_string(),
            self.rate.bufsize.arg.to_string(),
        ]);
        args
    }
}

/// Profile for the ffmpeg subprocess tier.
pub fn select(resolution: Resolution, platform: Platform) -> ParameterProfile {
    ParameterProfile::for_codec(direct_codec(platform), resolution)
}

/// Profile for the primary media-library tier.
pub fn select_library(resolution: Resolution, platform: Platform) -> ParameterProfile {
    ParameterProfile::for_codec(library_codec(platform), resolution)
}

/// `-pix_fmt yuv420p -movflags +faststart`, applied by every tier.
pub fn container_args() -> Vec<String> {
    vec![
        "-pix_fmt".to_string(),
        PIXEL_FORMAT.to_string(),
        "-movflags".to_string(),
        FASTSTART.to_string(),
    ]
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn resolution() -> impl Strategy<Value = Resolution> {
        prop::sample::select(Resolution::ALL.to_vec())
    }

    fn platform() -> impl Strategy<Value = Platform> {
        prop::sample::select(vec![
            Platform::Windows,
            Platform::MacOs,
            Platform::Linux,
            Platform::Other,
        ])
    }

    proptest! {
        /// Same inputs, same profile.
        #[test]
        fn prop_select_is_pure(r in resolution(), p in platform()) {
            prop_assert_eq!(select(r, p), select(r, p));
            prop_assert_eq!(select_library(r, p), select_library(r, p));
        }

        /// The ladder never depends on the platform.
        #[test]
        fn prop_ladder_platform_independent(r in resolution(), a in platform(), b in platform()) {
            prop_assert_eq!(select(r, a).rate, select(r, b).rate);
            prop_assert_eq!(select_library(r, a).rate, select(r, b).rate);
        }

        /// Higher resolution never gets fewer bits, and maxrate/bufsize stay above bitrate.
        #[test]
        fn prop_ladder_monotonic(a in resolution(), b in resolution()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let (lo, hi) = (ladder(lo), ladder(hi));
            prop_assert!(lo.bitrate.kbps <= hi.bitrate.kbps);
            prop_assert!(lo.crf >= hi.crf);
            prop_assert!(hi.maxrate.kbps > hi.bitrate.kbps);
            prop_assert!(hi.bufsize.kbps >= hi.maxrate.kbps);
        }
    }
}
