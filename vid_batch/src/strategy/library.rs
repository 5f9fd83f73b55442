//! Library-mediated tiers (1 and 2)

use super::{EncodeTier, TierContext, TierFailure, TierKind};
use crate::media::{scaled_width, MediaError, MediaLibrary, OpenOptions, TempAudioFile, WriteOptions};
use crate::params::{self, VideoCodec, AUDIO_BITRATE, AUDIO_CODEC, PRESET};
use crate::settings::ConversionSettings;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct LibraryTier {
    library: Arc<dyn MediaLibrary>,
    kind: TierKind,
}

impl LibraryTier {
    /// Tier 1: platform codec, ladder bitrates, profile/level/tag, all threads.
    pub fn primary(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            kind: TierKind::Library,
        }
    }

    /// Tier 2: H.264 with encoder defaults.
    pub fn minimal(library: Arc<dyn MediaLibrary>) -> Self {
        Self {
            library,
            kind: TierKind::LibraryMinimal,
        }
    }

    pub fn write_options(&self, settings: &ConversionSettings, temp_audio: &Path) -> WriteOptions {
        match self.kind {
            TierKind::LibraryMinimal => WriteOptions {
                codec: VideoCodec::H264.encoder().to_string(),
                audio_codec: AUDIO_CODEC.to_string(),
                audio_bitrate: None,
                preset: PRESET.to_string(),
                threads: None,
                extra_args: params::container_args(),
                temp_audio: temp_audio.to_path_buf(),
            },
            _ => {
                let profile = params::select_library(settings.resolution, settings.platform);
                let mut extra_args = profile.tuning_args();
                extra_args.extend(params::container_args());
                WriteOptions {
                    codec: profile.codec.encoder().to_string(),
                    audio_codec: AUDIO_CODEC.to_string(),
                    audio_bitrate: Some(AUDIO_BITRATE.to_string()),
                    preset: PRESET.to_string(),
                    threads: Some(0),
                    extra_args,
                    temp_audio: temp_audio.to_path_buf(),
                }
            }
        }
    }

    fn encode(&self, ctx: &TierContext<'_>) -> Result<(), MediaError> {
        let settings = ctx.settings;
        let height = settings.resolution.height();

        let source = self.library.open(ctx.input, &OpenOptions::default())?;
        let width = scaled_width(source.width, source.height, height)?;
        let resized = source.resized(width, height)?;
        let retimed = resized.with_fps(settings.fps.value());
        debug!(
            from = %format!("{}x{}", source.width, source.height),
            to = %format!("{}x{}", width, height),
            fps = settings.fps.value(),
            "transform"
        );

        let temp_audio = TempAudioFile::new(settings.output_dir());
        let options = self.write_options(settings, temp_audio.path());
        self.library.write(&retimed, ctx.output, &options)
    }
}

impl EncodeTier for LibraryTier {
    fn kind(&self) -> TierKind {
        self.kind
    }

    fn attempt(&self, ctx: &TierContext<'_>) -> Result<(), TierFailure> {
        self.encode(ctx)
            .map_err(|e| TierFailure::new(self.kind, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Clip, HandleTracker};
    use crate::settings::{FrameRate, Platform, Resolution};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records what it was asked to write; optionally fails at a given step.
    struct FakeLibrary {
        tracker: HandleTracker,
        fail_open: bool,
        fail_write: bool,
        dims: (u32, u32),
        written: Mutex<Vec<(PathBuf, (u32, u32), Option<u32>, WriteOptions, usize)>>,
    }

    impl FakeLibrary {
        fn new(dims: (u32, u32)) -> Self {
            Self {
                tracker: HandleTracker::new(),
                fail_open: false,
                fail_write: false,
                dims,
                written: Mutex::new(Vec::new()),
            }
        }
    }

    impl MediaLibrary for FakeLibrary {
        fn open(&self, path: &Path, options: &OpenOptions) -> Result<Clip, MediaError> {
            if self.fail_open {
                return Err(MediaError::Open {
                    path: path.to_path_buf(),
                    reason: "corrupt".into(),
                });
            }
            assert!(options.audio && !options.mask);
            Ok(Clip::open(&self.tracker, path, self.dims.0, self.dims.1, true, options))
        }

        fn write(&self, clip: &Clip, output: &Path, options: &WriteOptions) -> Result<(), MediaError> {
            self.written.lock().unwrap().push((
                output.to_path_buf(),
                clip.output_size(),
                clip.fps,
                options.clone(),
                self.tracker.live(),
            ));
            std::fs::write(&options.temp_audio, b"aac")?;
            if self.fail_write {
                return Err(MediaError::Encode("Unknown encoder 'libx265'".into()));
            }
            std::fs::write(output, b"video")?;
            Ok(())
        }

        fn handles(&self) -> &HandleTracker {
            &self.tracker
        }
    }

    fn settings(dir: &Path, platform: Platform) -> ConversionSettings {
        ConversionSettings::new(FrameRate::Fps24, Resolution::P360, dir).with_platform(platform)
    }

    #[test]
    fn test_primary_transforms_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let lib = Arc::new(FakeLibrary::new((1920, 1080)));
        let tier = LibraryTier::primary(lib.clone());
        let s = settings(dir.path(), Platform::Linux);
        let out = dir.path().join("o.mp4");
        let ctx = TierContext {
            input: Path::new("/in/a.mp4"),
            output: &out,
            settings: &s,
        };

        tier.attempt(&ctx).unwrap();

        let written = lib.written.lock().unwrap();
        let (path, size, fps, opts, live) = &written[0];
        assert_eq!(path, &out);
        assert_eq!(*size, (640, 360));
        assert_eq!(*fps, Some(24));
        assert_eq!(*live, 3);
        assert_eq!(opts.codec, "libx265");
        assert_eq!(opts.threads, Some(0));
        assert_eq!(opts.audio_bitrate.as_deref(), Some("128k"));
        assert!(opts.extra_args.windows(2).any(|w| w == ["-tag:v", "hvc1"]));
        assert!(opts.extra_args.windows(2).any(|w| w == ["-b:v", "0.3M"]));
        assert!(opts.extra_args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(!opts.temp_audio.exists());
        assert_eq!(lib.tracker.live(), 0);
    }

    #[test]
    fn test_primary_on_macos_uses_h264() {
        let dir = TempDir::new().unwrap();
        let tier = LibraryTier::primary(Arc::new(FakeLibrary::new((640, 480))));
        let opts = tier.write_options(&settings(dir.path(), Platform::MacOs), Path::new("t.m4a"));
        assert_eq!(opts.codec, "libx264");
        assert!(opts.extra_args.windows(2).any(|w| w == ["-profile:v", "high"]));
        assert!(!opts.extra_args.contains(&"-tag:v".to_string()));
    }

    #[test]
    fn test_minimal_drops_tuning() {
        let dir = TempDir::new().unwrap();
        let tier = LibraryTier::minimal(Arc::new(FakeLibrary::new((640, 480))));
        let opts = tier.write_options(&settings(dir.path(), Platform::Windows), Path::new("t.m4a"));
        assert_eq!(opts.codec, "libx264");
        assert_eq!(opts.audio_bitrate, None);
        assert_eq!(opts.threads, None);
        assert_eq!(opts.extra_args, params::container_args());
    }

    #[test]
    fn test_write_failure_releases_everything() {
        let dir = TempDir::new().unwrap();
        let mut fake = FakeLibrary::new((1280, 720));
        fake.fail_write = true;
        let lib = Arc::new(fake);
        let tier = LibraryTier::primary(lib.clone());
        let s = settings(dir.path(), Platform::Linux);
        let out = dir.path().join("o.mp4");
        let ctx = TierContext {
            input: Path::new("/in/a.mp4"),
            output: &out,
            settings: &s,
        };

        let err = tier.attempt(&ctx).unwrap_err();
        assert_eq!(err.tier, TierKind::Library);
        assert!(err.detail.contains("Unknown encoder"));
        assert_eq!(lib.tracker.live(), 0);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "temp audio leaked: {:?}", leftovers);
    }

    #[test]
    fn test_open_failure() {
        let dir = TempDir::new().unwrap();
        let mut fake = FakeLibrary::new((1280, 720));
        fake.fail_open = true;
        let tier = LibraryTier::minimal(Arc::new(fake));
        let s = settings(dir.path(), Platform::Linux);
        let out = dir.path().join("o.mp4");
        let ctx = TierContext {
            input: Path::new("/in/a.mp4"),
            output: &out,
            settings: &s,
        };
        let err = tier.attempt(&ctx).unwrap_err();
        assert_eq!(err.tier, TierKind::LibraryMinimal);
        assert!(err.detail.contains("corrupt"));
    }

    #[test]
    fn test_zero_geometry_fails_tier() {
        let dir = TempDir::new().unwrap();
        let lib = Arc::new(FakeLibrary::new((0, 0)));
        let tier = LibraryTier::primary(lib.clone());
        let s = settings(dir.path(), Platform::Linux);
        let out = dir.path().join("o.mp4");
        let ctx = TierContext {
            input: Path::new("/in/a.mp4"),
            output: &out,
            settings: &s,
        };
        assert!(tier.attempt(&ctx).is_err());
        assert_eq!(lib.tracker.live(), 0);
    }
}
