//! Tier 3: direct ffmpeg subprocess
//!
//! Exit status 0 is success. A non-zero exit or a launch failure is a tier
//! failure carrying the captured stderr diagnostic.

use super::{EncodeTier, TierContext, TierFailure, TierKind};
use crate::params::{self, AUDIO_BITRATE, AUDIO_CODEC, PRESET};
use crate::settings::ConversionSettings;
use shared_utils::ffmpeg_process::{path_arg, run_to_completion};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct DirectTier {
    ffmpeg: PathBuf,
}

impl DirectTier {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

/// Full argument list (without the program name) for one direct encode.
pub fn build_args(input: &Path, output: &Path, settings: &ConversionSettings) -> Vec<String> {
    let profile = params::select(settings.resolution, settings.platform);
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(input),
        "-vf".to_string(),
        format!("scale=-2:{}", settings.resolution.height()),
        "-r".to_string(),
        settings.fps.value().to_string(),
        "-c:v".to_string(),
        profile.codec.encoder().to_string(),
    ];
    args.extend(profile.tuning_args());
    args.extend([
        "-c:a".to_string(),
        AUDIO_CODEC.to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
    ]);
    args.extend(params::container_args());
    args.extend([
        "-preset".to_string(),
        PRESET.to_string(),
        "-crf".to_string(),
        profile.rate.crf.to_string(),
        path_arg(output),
    ]);
    args
}

impl EncodeTier for DirectTier {
    fn kind(&self) -> TierKind {
        TierKind::Direct
    }

    fn attempt(&self, ctx: &TierContext<'_>) -> Result<(), TierFailure> {
        let args = build_args(ctx.input, ctx.output, ctx.settings);
        let run = run_to_completion(&self.ffmpeg, &args)
            .map_err(|e| TierFailure::new(TierKind::Direct, format!("{:#}", e)))?;

        if run.success() {
            Ok(())
        } else {
            debug!(stderr = %run.stderr, "direct encode stderr");
            Err(TierFailure::new(TierKind::Direct, run.diagnostic()))
        }
    }
}
