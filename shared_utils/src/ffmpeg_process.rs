//! FFmpeg process management - avoids pipe deadlocks
//!
//! ## Background
//!
//! When both stdout and stderr are piped but only one is read, an ffmpeg run
//! that writes more than the pipe buffer (~64KB) of stderr blocks forever:
//! ffmpeg waits for stderr to drain, we wait for ffmpeg to exit.
//!
//! ## Approach
//!
//! A dedicated thread drains stderr concurrently, so the buffer never fills.
//! The drained text is returned on completion and becomes the diagnostic of a
//! failed run.
//!
//! The child runs in its own process group: a terminal Ctrl+C reaches only
//! our handler, and the file being encoded is allowed to finish.
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::run_to_completion;
//!
//! let args = vec!["-y".to_string(), "-i".to_string(), "in.mp4".to_string(), "out.mp4".to_string()];
//! let run = run_to_completion("ffmpeg".as_ref(), &args)?;
//! if !run.status.success() {
//!     eprintln!("{}", run.diagnostic());
//! }
//! ```

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Component, Path};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess - ffmpeg child with a concurrent stderr drain
// ═══════════════════════════════════════════════════════════════

pub struct FfmpegProcess {
    child: Child,
    stderr_thread: Option<JoinHandle<String>>,
    started: Instant,
}

impl FfmpegProcess {
    /// Spawn the configured command in a new process group with stdin
    /// closed, stdout discarded and stderr drained on a background thread.
    ///
    /// # Errors
    /// - the program could not be launched (missing binary, permissions)
    /// - stderr could not be captured
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        info!(command = %format!("{:?}", cmd), "Executing FFmpeg command");

        isolate_process_group(cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("Failed to spawn FFmpeg process")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stderr"))?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(|l| l.ok()) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        Ok(Self {
            child,
            stderr_thread: Some(stderr_thread),
            started: Instant::now(),
        })
    }

    /// Block until the process exits, returning its status and the whole stderr text.
    pub fn wait_with_output(mut self) -> Result<(ExitStatus, String, Duration)> {
        let status = self.child.wait().context("Failed to wait for FFmpeg")?;
        let elapsed = self.started.elapsed();
        let stderr = self
            .stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default();

        Ok((status, stderr, elapsed))
    }
}

/// Keep terminal SIGINT (Ctrl+C) away from the child.
fn isolate_process_group(cmd: &mut Command) {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
}

/// Stderr lines kept in a failure diagnostic.
pub const STDERR_TAIL_LINES: usize = 8;

/// A file path as a positional ffmpeg argument. Relative paths that would
/// read as an option (`-clip.mp4`) get a `./` prefix.
pub fn path_arg(path: &Path) -> String {
    let text = path.display().to_string();
    let relative = matches!(path.components().next(), Some(Component::Normal(_)));
    if relative && text.starts_with('-') {
        format!("./{}", text)
    } else {
        text
    }
}

/// Outcome of one finished ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegRun {
    pub status: ExitStatus,
    pub stderr: String,
    pub elapsed: Duration,
}

impl FfmpegRun {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// One-line report: the most relevant stderr line, exit code and hint.
    pub fn error_summary(&self) -> String {
        FfmpegError {
            stderr: self.stderr.clone(),
            exit_code: self.exit_code(),
            suggestion: get_error_suggestion(&self.stderr),
        }
        .to_string()
    }

    /// `error_summary` followed by the last lines of the captured stderr.
    pub fn diagnostic(&self) -> String {
        let tail = stderr_tail(&self.stderr, STDERR_TAIL_LINES);
        if tail.is_empty() {
            self.error_summary()
        } else {
            format!("{}\n{}", self.error_summary(), tail)
        }
    }
}

/// Last `max` non-empty stderr lines, progress lines skipped.
pub fn stderr_tail(stderr: &str, max: usize) -> String {
    let mut lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with("frame=") && !trimmed.starts_with("size=")
        })
        .rev()
        .take(max)
        .collect();
    lines.reverse();
    lines.join("\n")
}

/// Run `program args...` to completion and log it as an external tool call.
///
/// A non-zero exit is *not* an error here; callers decide what exit status
/// means. Only a launch/wait failure returns `Err`.
pub fn run_to_completion(program: &Path, args: &[String]) -> Result<FfmpegRun> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    let process = FfmpegProcess::spawn(&mut cmd)
        .with_context(|| format!("Failed to launch {}", program.display()))?;
    let (status, stderr, elapsed) = process.wait_with_output()?;

    let tool = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "ffmpeg".to_string());
    crate::logging::log_external_tool(&tool, args, &stderr, status.code(), elapsed);

    Ok(FfmpegRun {
        status,
        stderr,
        elapsed,
    })
}

// ═══════════════════════════════════════════════════════════════
// Error formatting
// ═══════════════════════════════════════════════════════════════

/// Pull the most meaningful line out of ffmpeg's stderr.
///
/// 1. the last line mentioning "Error"/"error"
/// 2. otherwise the last non-empty line that is not a progress line
/// 3. otherwise "Unknown FFmpeg error"
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// Detailed ffmpeg failure report.
#[derive(Debug, Clone)]
pub struct FfmpegError {
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for FfmpegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_ffmpeg_error(&self.stderr))?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit code {})", code)?;
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " 💡 {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for FfmpegError {}

/// Map common ffmpeg failure patterns to an actionable hint.
pub fn get_error_suggestion(stderr: &str) -> Option<String> {
    let patterns = [
        ("No such file or directory", "check that the input path exists"),
        ("Invalid data found", "the input looks corrupt or is not a video"),
        ("Unknown encoder", "install an ffmpeg build with libx264/libx265"),
        ("width not divisible by 2", "odd frame width; the direct encoder tier scales to an even width"),
        ("Permission denied", "check read/write permissions of input and output"),
        ("moov atom not found", "the input MP4 is truncated"),
        ("Too many packets buffered", "raise -max_muxing_queue_size"),
    ];

    patterns
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, suggestion)| suggestion.to_string())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any non-empty stderr yields a non-empty diagnostic.
        #[test]
        fn prop_format_error_non_empty(content in "[a-zA-Z0-9 ]{1,100}") {
            let error = format_ffmpeg_error(&content);
            prop_assert!(!error.is_empty());
        }

        /// An "Error" line always wins over surrounding noise.
        #[test]
        fn prop_format_error_prefers_error_line(
            prefix in "[a-zA-Z ]{0,50}",
            suffix in "[a-zA-Z ]{0,50}"
        ) {
            let stderr = format!("{}\nError: test error message\n{}", prefix, suffix);
            let error = format_ffmpeg_error(&stderr);
            prop_assert!(error.contains("Error") || error.contains("error"), "got: {}", error);
        }
    }
}
