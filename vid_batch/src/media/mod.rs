//! Media library capability used by the library-mediated encode tiers
//!
//! A source is opened into a [`Clip`]; `resized` and `with_fps` derive new
//! clips lazily, and [`MediaLibrary::write`] renders the final one. Every clip
//! holds a handle registered with a [`HandleTracker`] and releases it on drop,
//! so all handles are freed on every exit path of a tier, errors included.

pub mod ffmpeg;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub use ffmpeg::FfmpegMediaLibrary;

/// Read buffer requested when opening sources for the primary tier.
pub const READ_BUFFER: usize = 4096;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("cannot open {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("unsupported option: {0}")]
    Unsupported(String),

    #[error("invalid geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ═══════════════════════════════════════════════════════════════
// Handle tracking
// ═══════════════════════════════════════════════════════════════

/// Counts live clip handles.
#[derive(Debug, Clone, Default)]
pub struct HandleTracker {
    live: Arc<AtomicUsize>,
}

impl HandleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> HandleGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        HandleGuard {
            tracker: self.clone(),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct HandleGuard {
    tracker: HandleTracker,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════
// Clips
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenOptions {
    pub audio: bool,
    /// Decode an alpha mask alongside the frames (not supported)
    pub mask: bool,
    pub read_buffer: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            audio: true,
            mask: false,
            read_buffer: READ_BUFFER,
        }
    }
}

/// An opened source plus the transforms applied to it so far.
#[derive(Debug)]
pub struct Clip {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub native_fps: Option<f64>,
    pub duration: f64,
    pub has_audio: bool,
    pub read_buffer: usize,
    pub scale: Option<(u32, u32)>,
    pub fps: Option<u32>,
    handle: HandleGuard,
}

impl Clip {
    pub fn open(
        tracker: &HandleTracker,
        source: impl Into<PathBuf>,
        width: u32,
        height: u32,
        has_audio: bool,
        options: &OpenOptions,
    ) -> Self {
        Self {
            source: source.into(),
            width,
            height,
            native_fps: None,
            duration: 0.0,
            has_audio: has_audio && options.audio,
            read_buffer: options.read_buffer,
            scale: None,
            fps: None,
            handle: tracker.acquire(),
        }
    }

    pub fn with_stream_info(mut self, native_fps: Option<f64>, duration: f64) -> Self {
        self.native_fps = native_fps;
        self.duration = duration;
        self
    }

    fn derive(&self) -> Self {
        Self {
            source: self.source.clone(),
            width: self.width,
            height: self.height,
            native_fps: self.native_fps,
            duration: self.duration,
            has_audio: self.has_audio,
            read_buffer: self.read_buffer,
            scale: self.scale,
            fps: self.fps,
            handle: self.handle.tracker.acquire(),
        }
    }

    /// New clip scaled to `width`x`height`. Zero on either axis is rejected.
    pub fn resized(&self, width: u32, height: u32) -> Result<Clip, MediaError> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidGeometry { width, height });
        }
        let mut clip = self.derive();
        clip.scale = Some((width, height));
        Ok(clip)
    }

    /// New clip retimed to `fps`.
    pub fn with_fps(&self, fps: u32) -> Clip {
        let mut clip = self.derive();
        clip.fps = Some(fps);
        clip
    }

    /// Output size after transforms.
    pub fn output_size(&self) -> (u32, u32) {
        self.scale.unwrap_or((self.width, self.height))
    }
}

/// Width keeping the source aspect ratio at `target_height`, rounded down.
pub fn scaled_width(src_width: u32, src_height: u32, target_height: u32) -> Result<u32, MediaError> {
    if src_width == 0 || src_height == 0 {
        return Err(MediaError::InvalidGeometry {
            width: src_width,
            height: src_height,
        });
    }
    let width = u64::from(target_height) * u64::from(src_width) / u64::from(src_height);
    u32::try_from(width).map_err(|_| MediaError::InvalidGeometry {
        width: src_width,
        height: src_height,
    })
}

// ═══════════════════════════════════════════════════════════════
// Writing
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub codec: String,
    pub audio_codec: String,
    pub audio_bitrate: Option<String>,
    pub preset: String,
    /// `Some(0)` lets the encoder pick a thread count
    pub threads: Option<u32>,
    /// Passed to the video encode verbatim
    pub extra_args: Vec<String>,
    /// Side-channel file the audio is encoded to before muxing
    pub temp_audio: PathBuf,
}

pub trait MediaLibrary: Send + Sync {
    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Clip, MediaError>;
    fn write(&self, clip: &Clip, output: &Path, options: &WriteOptions) -> Result<(), MediaError>;
    fn handles(&self) -> &HandleTracker;
}

/// `temp_audio_{micros}.m4a` in the output directory, removed on drop.
#[derive(Debug)]
pub struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    pub fn new(dir: &Path) -> Self {
        let stamp = chrono::Utc::now().timestamp_micros();
        let mut path = dir.join(format!("temp_audio_{}.m4a", stamp));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("temp_audio_{}_{}.m4a", stamp, n));
            n += 1;
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        if self.path.exists() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "removed temp audio"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove temp audio"),
            }
        }
    }
}
