//! Shared utilities for the vid-batch tools
//!
//! - Logging (stderr + daily rolling file) and external-tool tracing
//! - Error types
//! - FFmpeg process wrapper (deadlock-free stderr capture)
//! - FFprobe wrapper for video analysis
//! - External tool discovery
//! - Batch file collection
//! - Progress bars and formatters
//! - Summary reporting and terminal colours

pub mod batch;
pub mod colors;
pub mod errors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod logging;
pub mod progress;
pub mod report;
pub mod tools;

pub use batch::{collect_files, expand_inputs, has_extension, is_video_file, VIDEO_EXTENSIONS};
pub use errors::{Result, VidBatchError};
pub use ffmpeg_process::{
    format_ffmpeg_error, get_error_suggestion, run_to_completion, FfmpegProcess, FfmpegRun,
};
pub use ffprobe::{parse_frame_rate, probe_video, FFprobeError, FFprobeResult};
pub use logging::{init_logging, log_external_tool, LogConfig};
pub use progress::{
    create_percent_bar, format_bytes, format_duration, format_hms, format_megabytes, BatchBars,
};
pub use report::{
    calculate_size_reduction, format_video_time, format_video_time_long, print_summary_report,
    SummaryReport,
};
pub use tools::{ffmpeg_path, ffprobe_path, is_ffmpeg_available};
