//! ffmpeg-backed `MediaLibrary`
//!
//! `open` probes the source with ffprobe. `write` renders in two passes: the
//! audio is encoded to the temp side-channel file first, then the video is
//! encoded and muxed with that audio copied in.

use super::{Clip, HandleTracker, MediaError, MediaLibrary, OpenOptions, WriteOptions};
use shared_utils::ffmpeg_process::{path_arg, run_to_completion};
use shared_utils::ffprobe::probe_video;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct FfmpegMediaLibrary {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    tracker: HandleTracker,
}

impl FfmpegMediaLibrary {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            tracker: HandleTracker::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(shared_utils::ffmpeg_path(), shared_utils::ffprobe_path())
    }

    fn run(&self, args: &[String]) -> Result<(), MediaError> {
        let run = run_to_completion(&self.ffmpeg, args)
            .map_err(|e| MediaError::Encode(format!("{:#}", e)))?;
        if run.success() {
            Ok(())
        } else {
            Err(MediaError::Encode(run.diagnostic()))
        }
    }
}

/// First pass: `-vn` audio encode into the temp file.
pub fn audio_pass_args(clip: &Clip, options: &WriteOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(&clip.source),
        "-vn".to_string(),
        "-c:a".to_string(),
        options.audio_codec.clone(),
    ];
    if let Some(ref bitrate) = options.audio_bitrate {
        args.extend(["-b:a".to_string(), bitrate.clone()]);
    }
    args.push(path_arg(&options.temp_audio));
    args
}

/// Second pass: video encode of the transformed clip, muxing the temp audio
/// when the clip has any.
pub fn video_pass_args(clip: &Clip, output: &Path, options: &WriteOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-thread_queue_size".to_string(),
        clip.read_buffer.to_string(),
        "-i".to_string(),
        path_arg(&clip.source),
    ];
    if clip.has_audio {
        args.extend([
            "-i".to_string(),
            path_arg(&options.temp_audio),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
        ]);
    } else {
        args.extend(["-map".to_string(), "0:v:0".to_string()]);
    }
    if let Some((w, h)) = clip.scale {
        args.extend(["-vf".to_string(), format!("scale={}:{}", w, h)]);
    }
    if let Some(fps) = clip.fps {
        args.extend(["-r".to_string(), fps.to_string()]);
    }
    args.extend([
        "-c:v".to_string(),
        options.codec.clone(),
        "-preset".to_string(),
        options.preset.clone(),
    ]);
    if let Some(threads) = options.threads {
        args.extend(["-threads".to_string(), threads.to_string()]);
    }
    args.extend(options.extra_args.iter().cloned());
    if clip.has_audio {
        args.extend(["-c:a".to_string(), "copy".to_string()]);
    } else {
        args.push("-an".to_string());
    }
    args.push(path_arg(output));
    args
}

impl MediaLibrary for FfmpegMediaLibrary {
    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Clip, MediaError> {
        if options.mask {
            return Err(MediaError::Unsupported("mask decoding".to_string()));
        }
        let info = probe_video(&self.ffprobe, path).map_err(|e| MediaError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(
            file = %path.display(),
            width = info.width,
            height = info.height,
            audio = info.has_audio,
            "opened source"
        );
        Ok(
            Clip::open(&self.tracker, path, info.width, info.height, info.has_audio, options)
                .with_stream_info(info.frame_rate, info.duration),
        )
    }

    fn write(&self, clip: &Clip, output: &Path, options: &WriteOptions) -> Result<(), MediaError> {
        if clip.has_audio {
            self.run(&audio_pass_args(clip, options))?;
        }
        let (w, h) = clip.output_size();
        info!(
            output = %output.display(),
            codec = %options.codec,
            "🎬 encoding {}x{}",
            w,
            h
        );
        self.run(&video_pass_args(clip, output, options))
    }

    fn handles(&self) -> &HandleTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> WriteOptions {
        WriteOptions {
            codec: "libx265".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: Some("128k".to_string()),
            preset: "medium".to_string(),
            threads: Some(0),
            extra_args: vec!["-pix_fmt".to_string(), "yuv420p".to_string()],
            temp_audio: PathBuf::from("/out/temp_audio_1.m4a"),
        }
    }

    #[test]
    fn test_video_pass_with_audio() {
        let tracker = HandleTracker::new();
        let src = Clip::open(&tracker, "/in/a.mp4", 1920, 1080, true, &OpenOptions::default());
        let clip = src.resized(640, 360).unwrap().with_fps(30);
        let args = video_pass_args(&clip, Path::new("/out/a_360p_30fps.mp4"), &options());
        assert_eq!(
            args,
            vec![
                "-y", "-thread_queue_size", "4096", "-i", "/in/a.mp4",
                "-i", "/out/temp_audio_1.m4a", "-map", "0:v:0", "-map", "1:a:0",
                "-vf", "scale=640:360", "-r", "30",
                "-c:v", "libx265", "-preset", "medium", "-threads", "0",
                "-pix_fmt", "yuv420p", "-c:a", "copy", "/out/a_360p_30fps.mp4",
            ]
        );
    }

    #[test]
    fn test_video_pass_without_audio() {
        let tracker = HandleTracker::new();
        let clip = Clip::open(&tracker, "/in/a.mp4", 640, 360, false, &OpenOptions::default());
        let mut opts = options();
        opts.threads = None;
        let args = video_pass_args(&clip, Path::new("o.mp4"), &opts);
        assert!(!args.contains(&"-threads".to_string()));
        assert!(!args.contains(&"/out/temp_audio_1.m4a".to_string()));
        assert_eq!(args[args.len() - 2], "-an");
    }

    #[test]
    fn test_audio_pass() {
        let tracker = HandleTracker::new();
        let clip = Clip::open(&tracker, "/in/a.mp4", 640, 360, true, &OpenOptions::default());
        let mut opts = options();
        assert_eq!(
            audio_pass_args(&clip, &opts),
            vec!["-y", "-i", "/in/a.mp4", "-vn", "-c:a", "aac", "-b:a", "128k", "/out/temp_audio_1.m4a"]
        );
        opts.audio_bitrate = None;
        assert!(!audio_pass_args(&clip, &opts).contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_dash_prefixed_source_is_not_an_option() {
        let tracker = HandleTracker::new();
        let clip = Clip::open(&tracker, "-a.mp4", 640, 360, true, &OpenOptions::default());
        let audio = audio_pass_args(&clip, &options());
        assert_eq!(&audio[1..3], ["-i", "./-a.mp4"]);
        let video = video_pass_args(&clip, Path::new("-a_360p_30fps.mp4"), &options());
        assert_eq!(&video[3..5], ["-i", "./-a.mp4"]);
        assert_eq!(video.last().unwrap(), "./-a_360p_30fps.mp4");
    }

    #[test]
    fn test_open_rejects_mask() {
        let lib = FfmpegMediaLibrary::new("ffmpeg", "ffprobe");
        let opts = OpenOptions {
            mask: true,
            ..OpenOptions::default()
        };
        assert!(matches!(
            lib.open(Path::new("a.mp4"), &opts),
            Err(MediaError::Unsupported(_))
        ));
        assert_eq!(lib.handles().live(), 0);
    }

    #[test]
    fn test_open_missing_file() {
        let lib = FfmpegMediaLibrary::new("ffmpeg", "ffprobe");
        assert!(matches!(
            lib.open(Path::new("/nonexistent/a.mp4"), &OpenOptions::default()),
            Err(MediaError::Open { .. })
        ));
    }

    #[test]
    fn test_write_with_missing_encoder_fails() {
        let lib = FfmpegMediaLibrary::new("/nonexistent/definitely_not_ffmpeg", "ffprobe");
        let clip = Clip::open(lib.handles(), "/in/a.mp4", 640, 360, false, &OpenOptions::default());
        assert!(matches!(
            lib.write(&clip, Path::new("/tmp/never.mp4"), &options()),
            Err(MediaError::Encode(_))
        ));
    }
}
