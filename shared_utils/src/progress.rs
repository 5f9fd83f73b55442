//! Progress Bar Module
//!
//! Unified bar style for the batch tools (████▓▓░░), plus the size and
//! duration formatters shared by logs and reports.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub const BAR_CHARS: &str = "█▓░";

/// Percentage bar (length 100) with a prefix and a free-form message.
pub fn create_percent_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:>10.cyan.bold} ▕{bar:40.green/black}▏ {pos:>3}% • {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(BAR_CHARS),
    );
    pb.set_prefix(prefix.to_string());
    pb
}

/// Overall + current-file bars stacked in one `MultiProgress`.
pub struct BatchBars {
    pub multi: MultiProgress,
    pub overall: ProgressBar,
    pub current: ProgressBar,
}

impl BatchBars {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(create_percent_bar("Batch"));
        let current = multi.add(create_percent_bar("File"));
        current.set_message("waiting...");
        Self {
            multi,
            overall,
            current,
        }
    }

    /// Print a line above the bars without tearing them.
    pub fn println(&self, line: &str) {
        if self.multi.println(line).is_err() {
            eprintln!("{}", line);
        }
    }

    pub fn finish(&self) {
        self.current.finish_and_clear();
        self.overall.finish();
    }
}

impl Default for BatchBars {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Megabytes with one decimal, as used in the per-file result line.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// `HH:MM:SS` for a media duration in seconds (fractions truncated).
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
