//! Report Module
//!
//! Size-reduction math and the boxed summary printed at the end of a batch.

use crate::progress::{format_bytes, format_duration};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Percentage saved going from `input_bytes` to `output_bytes`.
/// Negative when the output grew; 0.0 for an empty input.
pub fn calculate_size_reduction(input_bytes: u64, output_bytes: u64) -> f64 {
    if input_bytes == 0 {
        return 0.0;
    }
    (1.0 - output_bytes as f64 / input_bytes as f64) * 100.0
}

/// `S seconds (H h M m)` for the cumulative source duration of a batch.
pub fn format_video_time(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{} seconds ({} h {} m)", secs, secs / 3600, (secs % 3600) / 60)
}

/// `S seconds (H h M m S s)` for the batch-start total.
pub fn format_video_time_long(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{} seconds ({} h {} m {} s)",
        secs,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Everything the end-of-batch box shows.
#[derive(Debug, Clone)]
pub struct SummaryReport<'a> {
    pub title: &'a str,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs never dequeued because the batch was cancelled
    pub not_run: usize,
    pub interrupted: bool,
    pub video_seconds: f64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub elapsed: Duration,
    pub output_dir: &'a Path,
    pub failures: &'a [(PathBuf, String)],
}

impl SummaryReport<'_> {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64 * 100.0
        }
    }

    pub fn render(&self) -> String {
        let rule = "═".repeat(62);
        let mut out = Vec::new();
        out.push(String::new());
        out.push(format!("╔{}╗", rule));
        out.push(format!("║  📊 {:<56}║", format!("{} Summary Report", self.title)));
        out.push(format!("╠{}╣", rule));
        out.push(row("✅ Succeeded", &format!("{}/{}", self.succeeded, self.total)));
        out.push(row("❌ Failed", &self.failed.to_string()));
        if self.interrupted {
            out.push(row("⏹️  Not run", &self.not_run.to_string()));
        }
        out.push(row("📈 Success Rate", &format!("{:.1}%", self.success_rate())));
        out.push(format!("╠{}╣", rule));
        out.push(row("💾 Input Size", &format_bytes(self.input_bytes)));
        out.push(row("💾 Output Size", &format_bytes(self.output_bytes)));
        out.push(row(
            "📉 Size Reduction",
            &format!(
                "{:.1}%",
                calculate_size_reduction(self.input_bytes, self.output_bytes)
            ),
        ));
        out.push(format!("╠{}╣", rule));
        out.push(row("🎞️  Video Time", &format_video_time(self.video_seconds)));
        out.push(row("⏱️  Wall Time", &format_duration(self.elapsed)));
        out.push(row(
            "🏁 State",
            if self.interrupted { "interrupted" } else { "completed" },
        ));
        out.push(format!("╚{}╝", rule));
        out.push(format!("📂 Output: {}", self.output_dir.display()));

        if !self.failures.is_empty() {
            out.push(String::new());
            out.push("❌ Errors encountered:".to_string());
            out.push("━".repeat(64));
            for (path, error) in self.failures {
                out.push(format!("   {} → {}", path.display(), error));
            }
        }
        out.join("\n")
    }
}

fn row(label: &str, value: &str) -> String {
    format!("║  {:<20}{:>38}  ║", label, value)
}

pub fn print_summary_report(report: &SummaryReport<'_>) {
    println!("{}", report.render());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample<'a>(dir: &'a Path, failures: &'a [(PathBuf, String)]) -> SummaryReport<'a> {
        SummaryReport {
            title: "Video Batch",
            total: 3,
            succeeded: 2,
            failed: 1,
            not_run: 0,
            interrupted: false,
            video_seconds: 15.0,
            input_bytes: 1000,
            output_bytes: 250,
            elapsed: Duration::from_secs(75),
            output_dir: dir,
            failures,
        }
    }

    #[test]
    fn test_size_reduction_formula() {
        assert!((calculate_size_reduction(1000, 500) - 50.0).abs() < 0.01);
        assert!((calculate_size_reduction(1000, 250) - 75.0).abs() < 0.01);
        assert!(calculate_size_reduction(1000, 1000).abs() < 0.01);
        assert!((calculate_size_reduction(500, 1000) + 100.0).abs() < 0.01);
        assert_eq!(calculate_size_reduction(0, 10), 0.0);
    }

    #[test]
    fn test_format_video_time() {
        assert_eq!(format_video_time(15.0), "15 seconds (0 h 0 m)");
        assert_eq!(format_video_time(3725.9), "3725 seconds (1 h 2 m)");
        assert_eq!(format_video_time(0.0), "0 seconds (0 h 0 m)");
        assert_eq!(
            format_video_time_long(3725.0),
            "3725 seconds (1 h 2 m 5 s)"
        );
    }

    #[test]
    fn test_render_contains_counts_and_failures() {
        let dir = PathBuf::from("/tmp/out");
        let failures = vec![(PathBuf::from("bad.mp4"), "all tiers failed".to_string())];
        let text = sample(&dir, &failures).render();
        assert!(text.contains("2/3"));
        assert!(text.contains("75.0%"));
        assert!(text.contains("15 seconds (0 h 0 m)"));
        assert!(text.contains("completed"));
        assert!(text.contains("/tmp/out"));
        assert!(text.contains("bad.mp4 → all tiers failed"));
        assert!(!text.contains("Not run"));
    }

    #[test]
    fn test_render_interrupted() {
        let dir = PathBuf::from("out");
        let mut report = sample(&dir, &[]);
        report.interrupted = true;
        report.not_run = 1;
        let text = report.render();
        assert!(text.contains("interrupted"));
        assert!(text.contains("Not run"));
        assert!(!text.contains("Errors encountered"));
    }

    #[test]
    fn test_success_rate_empty_batch() {
        let dir = PathBuf::from("out");
        let mut report = sample(&dir, &[]);
        report.total = 0;
        report.succeeded = 0;
        assert_eq!(report.success_rate(), 0.0);
    }
}
