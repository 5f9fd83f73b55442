//! vid-batch - sequential batch video downscaler
//!
//! Converts a list of videos one at a time to a fixed codec family at
//! 24/30 fps and 360p–1080p, through a three-tier fallback chain:
//!
//! - library (platform codec, bitrate ladder)
//! - library-minimal (H.264, encoder defaults)
//! - direct ffmpeg subprocess
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vid_batch::*;
//!
//! let settings = ConversionSettings::new(FrameRate::Fps30, Resolution::P480, "out/");
//! let mut batch = Batch::new(settings);
//! batch.add_all(&inputs, &FfprobeDurationProbe::from_env(), &NullSink);
//!
//! let library = Arc::new(FfmpegMediaLibrary::from_env());
//! let chain = EncodeStrategyChain::standard(library, shared_utils::ffmpeg_path());
//! let summary = ConversionScheduler::new(chain, Arc::new(NullSink)).run(batch, true)?;
//! println!("{}", summary.headline());
//! ```

pub mod events;
pub mod media;
pub mod output_path;
pub mod params;
pub mod probe;
pub mod progress_estimator;
pub mod scheduler;
pub mod settings;
pub mod strategy;

pub use events::{BatchEvent, CollectingSink, EventSink, NullSink};
pub use media::{FfmpegMediaLibrary, MediaError, MediaLibrary};
pub use params::{select, select_library, ParameterProfile, VideoCodec};
pub use probe::{DurationProbe, FfprobeDurationProbe, ProbeOutcome};
pub use progress_estimator::{Clock, ProgressEstimator, SystemClock};
pub use scheduler::{
    Batch, BatchSnapshot, BatchState, BatchSummary, ConversionScheduler, Job, JobStatus,
    SchedulerHandle, MAX_FILES,
};
pub use settings::{ConversionSettings, FrameRate, Platform, Resolution};
pub use strategy::{ChainOutcome, EncodeStrategyChain, EncodeTier, TierFailure, TierKind};

pub use shared_utils::errors::{Result, VidBatchError};
