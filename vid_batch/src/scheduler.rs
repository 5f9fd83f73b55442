//! Conversion scheduler
//!
//! A [`Batch`] collects jobs under one frozen [`ConversionSettings`]
//! snapshot. [`ConversionScheduler::run`] drains it in FIFO order, one job at
//! a time, on the calling thread:
//!
//! ```text
//! Idle → Running → Completed
//!                ↘ Cancelled   (flag observed before a dequeue)
//! ```
//!
//! Observers hold a [`SchedulerHandle`]: they read snapshots and may request
//! cancellation, nothing else. A job already encoding always runs to its own
//! end; aggregates change only after a job reaches a terminal state.

use crate::events::{BatchEvent, EventSink};
use crate::output_path;
use crate::probe::DurationProbe;
use crate::progress_estimator::{Clock, ProgressTicker, SystemClock, POLL_INTERVAL};
use crate::settings::ConversionSettings;
use crate::strategy::{ChainOutcome, EncodeStrategyChain, TierContext, TierKind};
use serde::Serialize;
use shared_utils::report::{calculate_size_reduction, SummaryReport};
use shared_utils::{Result, VidBatchError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Most files one batch accepts.
pub const MAX_FILES: usize = 100;

// ═══════════════════════════════════════════════════════════════
// Jobs and batches
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub input: PathBuf,
    /// Resolved when the job is dequeued
    pub output: Option<PathBuf>,
    /// Probed source duration, 0.0 when unknown
    pub duration_seconds: f64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub status: JobStatus,
    pub tier: Option<TierKind>,
    pub error: Option<String>,
}

impl Job {
    fn new(input: PathBuf, duration_seconds: f64, input_bytes: u64) -> Self {
        Self {
            input,
            output: None,
            duration_seconds,
            input_bytes,
            output_bytes: 0,
            status: JobStatus::Pending,
            tier: None,
            error: None,
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    let canon = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    canon(a) == canon(b)
}

#[derive(Debug, Clone)]
pub struct Batch {
    settings: ConversionSettings,
    jobs: VecDeque<Job>,
}

impl Batch {
    pub fn new(settings: ConversionSettings) -> Self {
        Self {
            settings,
            jobs: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Sum of the probed durations of every queued job.
    pub fn total_duration(&self) -> f64 {
        self.jobs.iter().map(|j| j.duration_seconds).sum()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.jobs.iter().any(|j| same_file(&j.input, path))
    }

    /// Accept one file. Rejections are reported through `sink`, never as errors.
    pub fn add(&mut self, path: &Path, probe: &dyn DurationProbe, sink: &dyn EventSink) -> bool {
        let reject = |reason: &str| {
            warn!(file = %path.display(), reason, "⏭️  file rejected");
            sink.emit(BatchEvent::FileRejected {
                path: path.to_path_buf(),
                reason: reason.to_string(),
            });
            false
        };

        if self.jobs.len() >= MAX_FILES {
            return reject(&format!("batch limit of {} files reached", MAX_FILES));
        }
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return reject("file does not exist"),
        };
        if !meta.is_file() {
            return reject("not a regular file");
        }
        if self.contains(path) {
            return reject("already in batch");
        }

        let unusual_extension = !shared_utils::is_video_file(path);
        if unusual_extension {
            warn!(file = %path.display(), "⚠️  unusual extension, converting anyway");
        }

        let outcome = probe.probe(path);
        info!(
            file = %path.display(),
            size = %shared_utils::format_bytes(meta.len()),
            duration = %outcome.duration_display(),
            "📂 file added"
        );
        sink.emit(BatchEvent::FileAccepted {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
            duration_seconds: outcome.ok.then_some(outcome.duration_seconds),
            native_fps: outcome.native_fps,
            unusual_extension,
        });
        self.jobs
            .push_back(Job::new(path.to_path_buf(), outcome.duration_seconds, meta.len()));
        true
    }

    pub fn add_all(
        &mut self,
        paths: &[PathBuf],
        probe: &dyn DurationProbe,
        sink: &dyn EventSink,
    ) -> usize {
        paths
            .iter()
            .filter(|p| self.add(p, probe, sink))
            .count()
    }

    /// Drop a queued job, and with it its duration.
    pub fn remove(&mut self, path: &Path) -> Option<Job> {
        let pos = self.jobs.iter().position(|j| same_file(&j.input, path))?;
        self.jobs.remove(pos)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

/// Make sure `dir` exists and is a directory, creating it when allowed.
pub fn prepare_output_dir(dir: &Path, create: bool) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(VidBatchError::OutputNotDirectory(dir.to_path_buf()));
    }
    if !create {
        return Err(VidBatchError::OutputDirMissing(dir.to_path_buf()));
    }
    std::fs::create_dir_all(dir).map_err(|source| VidBatchError::OutputDirCreate {
        path: dir.to_path_buf(),
        source,
    })?;
    info!(dir = %dir.display(), "📁 created output directory");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Snapshots and handle
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSnapshot {
    pub state: BatchState,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cumulative_duration_seconds: f64,
    /// `completed / total * 100`
    pub overall_percent: u8,
    pub current_job: Option<usize>,
    pub job_percent: u8,
}

impl Default for BatchSnapshot {
    fn default() -> Self {
        Self {
            state: BatchState::Idle,
            total: 0,
            completed: 0,
            failed: 0,
            cumulative_duration_seconds: 0.0,
            overall_percent: 0,
            current_job: None,
            job_percent: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: RwLock<BatchSnapshot>,
    cancel: Arc<AtomicBool>,
    job_percent: AtomicU8,
}

impl Shared {
    fn update<F: FnOnce(&mut BatchSnapshot)>(&self, f: F) {
        let mut snap = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        f(&mut snap);
    }
}

/// Read-only view of a scheduler plus the cancellation signal.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Stop before the next dequeue. The job in flight is not interrupted.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let mut snap = self
            .shared
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        snap.job_percent = self.shared.job_percent.load(Ordering::SeqCst);
        snap
    }
}

// ═══════════════════════════════════════════════════════════════
// Summary
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Left in the queue by a cancellation
    pub not_run: usize,
    /// Source duration of the successful jobs
    pub cumulative_duration_seconds: f64,
    pub output_dir: PathBuf,
    pub interrupted: bool,
    /// Sizes of the successful jobs only
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub elapsed_seconds: f64,
    pub failures: Vec<(PathBuf, String)>,
    pub jobs: Vec<Job>,
}

impl BatchSummary {
    /// `2/3 succeeded`
    pub fn headline(&self) -> String {
        format!("{}/{} succeeded", self.succeeded, self.total)
    }

    pub fn report(&self) -> SummaryReport<'_> {
        SummaryReport {
            title: "Video Batch",
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            not_run: self.not_run,
            interrupted: self.interrupted,
            video_seconds: self.cumulative_duration_seconds,
            input_bytes: self.input_bytes,
            output_bytes: self.output_bytes,
            elapsed: Duration::from_secs_f64(self.elapsed_seconds.max(0.0)),
            output_dir: &self.output_dir,
            failures: &self.failures,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct ConversionScheduler {
    chain: EncodeStrategyChain,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    poll: Duration,
    shared: Arc<Shared>,
}

impl ConversionScheduler {
    pub fn new(chain: EncodeStrategyChain, sink: Arc<dyn EventSink>) -> Self {
        Self {
            chain,
            sink,
            clock: Arc::new(SystemClock),
            poll: POLL_INTERVAL,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn begin(&self, total: usize) -> Result<()> {
        let mut snap = self
            .shared
            .snapshot
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if snap.state == BatchState::Running {
            return Err(VidBatchError::BatchAlreadyRunning);
        }
        *snap = BatchSnapshot {
            state: BatchState::Running,
            total,
            ..BatchSnapshot::default()
        };
        self.shared.job_percent.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn abort_start(&self) {
        self.shared.update(|s| s.state = BatchState::Idle);
    }

    /// Run every job of `batch` and return the summary.
    ///
    /// # Errors
    /// Only setup problems, before any job is dequeued: an empty batch, an
    /// unusable output directory, or a batch already running.
    pub fn run(&self, batch: Batch, create_output_dir: bool) -> Result<BatchSummary> {
        self.begin(batch.len())?;
        if batch.is_empty() {
            self.abort_start();
            return Err(VidBatchError::NoInputs);
        }
        if let Err(e) = prepare_output_dir(batch.settings.output_dir(), create_output_dir) {
            self.abort_start();
            return Err(e);
        }

        let Batch { settings, jobs } = batch;
        Ok(self.drain(settings, jobs))
    }

    fn drain(&self, settings: ConversionSettings, mut queue: VecDeque<Job>) -> BatchSummary {
        let started = Instant::now();
        let total = queue.len();
        let total_duration: f64 = queue.iter().map(|j| j.duration_seconds).sum();

        info!(
            "🎬 batch start: {} | total video time {}",
            settings.describe(total),
            shared_utils::format_video_time_long(total_duration)
        );
        self.sink.emit(BatchEvent::BatchStarted {
            total,
            total_duration_seconds: total_duration,
            settings: settings.clone(),
        });

        let mut finished: Vec<Job> = Vec::with_capacity(total);
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut cumulative = 0.0f64;
        let mut input_bytes = 0u64;
        let mut output_bytes = 0u64;
        let mut interrupted = false;

        loop {
            if self.shared.cancel.load(Ordering::SeqCst) {
                interrupted = !queue.is_empty();
                if interrupted {
                    warn!(remaining = queue.len(), "⏹️  batch cancelled");
                }
                break;
            }
            let Some(mut job) = queue.pop_front() else {
                break;
            };
            let index = finished.len();

            job.status = JobStatus::InProgress;
            let output = output_path::resolve(
                &job.input,
                settings.output_dir(),
                settings.resolution,
                settings.fps,
            );
            job.output = Some(output.clone());

            self.shared.job_percent.store(0, Ordering::SeqCst);
            self.shared.update(|s| s.current_job = Some(index));
            info!(
                "🎬 [{}/{}] {} → {}",
                index + 1,
                total,
                job.input.display(),
                output.display()
            );
            self.sink.emit(BatchEvent::JobStarted {
                job: index,
                total,
                input: job.input.clone(),
                output: output.clone(),
            });
            self.sink.emit(BatchEvent::JobProgress {
                job: index,
                percent: 0,
            });

            let ticker = self.start_ticker(index);
            let outcome = {
                let ctx = TierContext {
                    input: &job.input,
                    output: &output,
                    settings: &settings,
                };
                self.chain.run(&ctx, index, self.sink.as_ref())
            };

            match outcome {
                ChainOutcome::Succeeded {
                    tier,
                    output_bytes: bytes,
                    ..
                } => {
                    job.status = JobStatus::Succeeded;
                    job.tier = Some(tier);
                    job.output_bytes = bytes;

                    let percent = ticker.finish();
                    self.shared.job_percent.store(percent, Ordering::SeqCst);
                    self.sink.emit(BatchEvent::JobProgress {
                        job: index,
                        percent,
                    });

                    completed += 1;
                    cumulative += job.duration_seconds;
                    input_bytes += job.input_bytes;
                    output_bytes += bytes;

                    let reduction = calculate_size_reduction(job.input_bytes, bytes);
                    info!(
                        "✅ {} → {} ({:.1}% reduction, {})",
                        shared_utils::format_megabytes(job.input_bytes),
                        shared_utils::format_megabytes(bytes),
                        reduction,
                        tier
                    );
                    self.sink.emit(BatchEvent::JobSucceeded {
                        job: index,
                        input: job.input.clone(),
                        output,
                        tier,
                        input_bytes: job.input_bytes,
                        output_bytes: bytes,
                        reduction_percent: reduction,
                    });
                }
                ChainOutcome::Failed { reason, .. } => {
                    ticker.stop();
                    job.status = JobStatus::Failed;
                    job.error = Some(reason.clone());
                    failed += 1;
                    error!(file = %job.input.display(), "❌ {}", reason);
                    self.sink.emit(BatchEvent::JobFailed {
                        job: index,
                        input: job.input.clone(),
                        reason,
                    });
                }
            }

            let percent = overall_percent(completed, total);
            self.shared.update(|s| {
                s.completed = completed;
                s.failed = failed;
                s.cumulative_duration_seconds = cumulative;
                s.overall_percent = percent;
                s.current_job = None;
            });
            self.sink.emit(BatchEvent::OverallProgress {
                percent,
                completed,
                total,
            });
            finished.push(job);
        }

        let not_run = queue.len();
        finished.extend(queue);
        let state = if interrupted {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        };
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.update(|s| s.state = state);

        let failures = finished
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .map(|j| {
                (
                    j.input.clone(),
                    j.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                )
            })
            .collect();

        let summary = BatchSummary {
            total,
            succeeded: completed,
            failed,
            not_run,
            cumulative_duration_seconds: cumulative,
            output_dir: settings.output_dir,
            interrupted,
            input_bytes,
            output_bytes,
            elapsed_seconds: started.elapsed().as_secs_f64(),
            failures,
            jobs: finished,
        };
        info!(
            "📊 {} | video time {}{}",
            summary.headline(),
            shared_utils::format_video_time(cumulative),
            if interrupted { " | interrupted" } else { "" }
        );
        self.sink.emit(BatchEvent::BatchFinished {
            summary: summary.clone(),
        });
        summary
    }

    fn start_ticker(&self, index: usize) -> ProgressTicker {
        let sink = Arc::clone(&self.sink);
        let shared = Arc::clone(&self.shared);
        ProgressTicker::start(
            Arc::clone(&self.clock),
            self.poll,
            Arc::clone(&self.shared.cancel),
            move |percent| {
                shared.job_percent.store(percent, Ordering::SeqCst);
                sink.emit(BatchEvent::JobProgress {
                    job: index,
                    percent,
                });
            },
        )
    }
}

fn overall_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (completed * 100 / total).min(100) as u8
}
