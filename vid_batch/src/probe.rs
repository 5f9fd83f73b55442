//! Duration probing
//!
//! Advisory only: a probe failure yields `ProbeOutcome::unknown()` and a
//! warning, never an error, and the file still enters the batch.

use serde::Serialize;
use shared_utils::ffprobe::probe_video;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeOutcome {
    /// Seconds, 0.0 when unknown
    pub duration_seconds: f64,
    pub native_fps: Option<f64>,
    pub ok: bool,
}

impl ProbeOutcome {
    pub fn known(duration_seconds: f64, native_fps: Option<f64>) -> Self {
        Self {
            duration_seconds,
            native_fps,
            ok: true,
        }
    }

    pub fn unknown() -> Self {
        Self {
            duration_seconds: 0.0,
            native_fps: None,
            ok: false,
        }
    }

    /// `HH:MM:SS`, or "unknown" when the probe failed.
    pub fn duration_display(&self) -> String {
        if self.ok {
            shared_utils::format_hms(self.duration_seconds)
        } else {
            "unknown".to_string()
        }
    }
}

pub trait DurationProbe: Send + Sync {
    fn probe(&self, path: &Path) -> ProbeOutcome;
}

/// `DurationProbe` backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    ffprobe: PathBuf,
}

impl FfprobeDurationProbe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    /// Uses `VID_BATCH_FFPROBE` or the `ffprobe` on `PATH`.
    pub fn from_env() -> Self {
        Self::new(shared_utils::ffprobe_path())
    }
}

impl DurationProbe for FfprobeDurationProbe {
    fn probe(&self, path: &Path) -> ProbeOutcome {
        match probe_video(&self.ffprobe, path) {
            Ok(info) => {
                debug!(
                    file = %path.display(),
                    duration = info.duration,
                    fps = ?info.frame_rate,
                    "probed"
                );
                ProbeOutcome::known(info.duration, info.frame_rate)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "⚠️  duration probe failed, continuing");
                ProbeOutcome::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_outcome() {
        let o = ProbeOutcome::unknown();
        assert!(!o.ok);
        assert_eq!(o.duration_seconds, 0.0);
        assert_eq!(o.duration_display(), "unknown");
    }

    #[test]
    fn test_known_outcome_display() {
        let o = ProbeOutcome::known(3725.4, Some(29.97));
        assert_eq!(o.duration_display(), "01:02:05");
    }

    #[test]
    fn test_missing_file_is_advisory() {
        let probe = FfprobeDurationProbe::new("ffprobe");
        let o = probe.probe(Path::new("/nonexistent/video.mp4"));
        assert_eq!(o, ProbeOutcome::unknown());
    }

    #[test]
    fn test_missing_binary_is_advisory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let probe = FfprobeDurationProbe::new("/nonexistent/definitely_not_ffprobe");
        assert!(!probe.probe(file.path()).ok);
    }
}
