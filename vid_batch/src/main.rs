use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn, Level};

use shared_utils::colors;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::progress::BatchBars;
use vid_batch::{
    output_path, params, strategy, Batch, BatchEvent, BatchSummary, ConversionScheduler,
    ConversionSettings, DurationProbe, EncodeStrategyChain, EventSink, FfmpegMediaLibrary,
    FfprobeDurationProbe, FrameRate, MediaLibrary, Platform, Resolution, VidBatchError,
};

#[derive(Parser)]
#[command(name = "vid-batch")]
#[command(version, about = "Sequential batch video downscaler (24/30 fps, 360p-1080p)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logs, also echoed to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files (and directories of videos) one at a time
    Run {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (default: ~/Downloads)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "30", value_parser = parse_fps)]
        fps: FrameRate,
        #[arg(long, default_value = "360", value_parser = parse_resolution)]
        resolution: Resolution,
        /// Descend into subdirectories of directory inputs
        #[arg(short, long)]
        recursive: bool,
        /// Refuse to start when the output directory does not exist
        #[arg(long)]
        no_create_dir: bool,
        /// Print the batch summary as JSON instead of progress bars
        #[arg(long)]
        json: bool,
    },

    /// Show parameters, output path and direct encoder command for one file
    Plan {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "30", value_parser = parse_fps)]
        fps: FrameRate,
        #[arg(long, default_value = "360", value_parser = parse_resolution)]
        resolution: Resolution,
    },

    /// Probe duration and native frame rate of one file
    Probe {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn parse_fps(s: &str) -> Result<FrameRate, String> {
    s.parse().map_err(|e: VidBatchError| e.to_string())
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    s.parse().map_err(|e: VidBatchError| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    if let Err(e) = init_logging(
        "vid_batch",
        LogConfig::default()
            .with_level(level)
            .with_stderr(cli.verbose),
    ) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }

    match cli.command {
        Commands::Run {
            inputs,
            output,
            fps,
            resolution,
            recursive,
            no_create_dir,
            json,
        } => {
            let output_dir = output.unwrap_or_else(vid_batch::settings::default_output_dir);
            let settings = ConversionSettings::new(fps, resolution, output_dir);
            let code = run_batch(&inputs, settings, recursive, !no_create_dir, json)?;
            if code != 0 {
                std::process::exit(code);
            }
        }

        Commands::Plan {
            input,
            output,
            fps,
            resolution,
        } => {
            let output_dir = output.unwrap_or_else(vid_batch::settings::default_output_dir);
            print_plan(&input, &ConversionSettings::new(fps, resolution, output_dir));
        }

        Commands::Probe { input, json } => {
            let outcome = FfprobeDurationProbe::from_env().probe(&input);
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("📁 File: {}", input.display());
                println!("⏱️  Duration: {}", outcome.duration_display());
                match outcome.native_fps {
                    Some(fps) => println!("🎞️  Frame rate: {:.2} fps", fps),
                    None => println!("🎞️  Frame rate: unknown"),
                }
            }
        }
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// run
// ═══════════════════════════════════════════════════════════════

/// Exit code: 0 all converted, 1 some failed or setup refused, 130 interrupted.
fn run_batch(
    inputs: &[PathBuf],
    settings: ConversionSettings,
    recursive: bool,
    create_dir: bool,
    json: bool,
) -> anyhow::Result<i32> {
    if !shared_utils::is_ffmpeg_available() {
        warn!("⚠️  ffmpeg not found; set VID_BATCH_FFMPEG or install ffmpeg");
        if !json {
            eprintln!(
                "{}",
                colors::warning().apply_to("⚠️  ffmpeg not found on PATH, conversions will fail")
            );
        }
    }

    info!("🎬 vid-batch run: {}p / {}fps on {}", settings.resolution, settings.fps, settings.platform);
    let files = shared_utils::expand_inputs(inputs, recursive);

    let (tx, rx) = channel::<BatchEvent>();
    let probe = FfprobeDurationProbe::from_env();
    let mut batch = Batch::new(settings);
    batch.add_all(&files, &probe, &tx);

    let library: Arc<dyn MediaLibrary> = Arc::new(FfmpegMediaLibrary::from_env());
    let chain = EncodeStrategyChain::standard(library, shared_utils::ffmpeg_path());
    let sink: Arc<dyn EventSink> = Arc::new(tx);
    let scheduler = ConversionScheduler::new(chain, sink);
    let handle = scheduler.handle();

    let interrupted_once = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted_once);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!(
            "\n{}",
            colors::warning().apply_to("Received Ctrl+C, finishing current file...")
        );
        handle.cancel();
    })?;

    let worker = thread::Builder::new()
        .name("vid-batch-worker".to_string())
        .spawn(move || {
            let result = scheduler.run(batch, create_dir);
            drop(scheduler);
            result
        })?;

    render_events(rx, json);

    let result = worker
        .join()
        .map_err(|_| anyhow::anyhow!("conversion worker panicked"))?;

    match result {
        Ok(summary) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_final(&summary);
            }
            Ok(if summary.interrupted {
                130
            } else if summary.failed > 0 {
                1
            } else {
                0
            })
        }
        Err(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ErrorReport::from(&e))?);
            } else {
                eprintln!("{}", colors::error().apply_to(format!("❌ {}", e)));
                if let VidBatchError::OutputDirMissing(_) = e {
                    eprintln!("💡 drop --no-create-dir to have it created");
                }
            }
            Ok(1)
        }
    }
}

#[derive(Serialize)]
struct ErrorReport {
    error: String,
    setup: bool,
}

impl From<&VidBatchError> for ErrorReport {
    fn from(e: &VidBatchError) -> Self {
        Self {
            error: e.to_string(),
            setup: e.is_setup_error(),
        }
    }
}

/// Drain the event stream until the worker drops its sender.
fn render_events(rx: Receiver<BatchEvent>, json: bool) {
    if json {
        for _ in rx {}
        return;
    }

    let bars = BatchBars::new();
    for event in rx {
        render_event(&bars, &event);
    }
    bars.finish();
}

fn render_event(bars: &BatchBars, event: &BatchEvent) {
    match event {
        BatchEvent::FileAccepted {
            path,
            size_bytes,
            duration_seconds,
            native_fps,
            unusual_extension,
        } => {
            let duration = duration_seconds
                .map(shared_utils::format_hms)
                .unwrap_or_else(|| "unknown".to_string());
            let fps = native_fps
                .map(|f| format!("{:.1}fps", f))
                .unwrap_or_else(|| "?fps".to_string());
            bars.println(&format!(
                "📂 {} ({}, {}, {})",
                display_name(path),
                shared_utils::format_bytes(*size_bytes),
                duration,
                fps
            ));
            if *unusual_extension {
                bars.println(&format!(
                    "{}",
                    colors::warning().apply_to("   ⚠️  not a usual video extension, trying anyway")
                ));
            }
        }
        BatchEvent::FileRejected { path, reason } => {
            bars.println(&format!(
                "{}",
                colors::dim().apply_to(format!("⏭️  {}: {}", path.display(), reason))
            ));
        }
        BatchEvent::BatchStarted {
            total,
            total_duration_seconds,
            settings,
        } => {
            bars.println(&format!("🎬 {}", settings.describe(*total)));
            bars.println(&format!(
                "⏱️  Total video time: {}",
                shared_utils::format_video_time_long(*total_duration_seconds)
            ));
            bars.overall.set_position(0);
            bars.overall.set_message(format!("0/{}", total));
        }
        BatchEvent::JobStarted {
            job,
            total,
            input,
            output,
        } => {
            bars.println(&format!(
                "🎬 [{}/{}] {} → {}",
                job + 1,
                total,
                display_name(input),
                display_name(output)
            ));
            bars.current.set_position(0);
            bars.current.set_message(display_name(input));
        }
        BatchEvent::TierStarted { .. } => {}
        BatchEvent::TierFallback { tier, reason, .. } => {
            bars.println(&format!(
                "{}",
                colors::warning().apply_to(format!("   ⚠️  {} failed: {}", tier, reason))
            ));
        }
        BatchEvent::JobProgress { percent, .. } => {
            bars.current.set_position(u64::from(*percent));
        }
        BatchEvent::JobSucceeded {
            output,
            tier,
            input_bytes,
            output_bytes,
            reduction_percent,
            ..
        } => {
            bars.println(&format!(
                "{} {} → {} ({} reduction) via {} → {}",
                colors::success().apply_to("   ✅"),
                shared_utils::format_megabytes(*input_bytes),
                shared_utils::format_megabytes(*output_bytes),
                colors::fmt_reduction(*reduction_percent),
                tier,
                output.display()
            ));
        }
        BatchEvent::JobFailed { input, reason, .. } => {
            bars.println(&format!(
                "{}",
                colors::error().apply_to(format!("   ❌ {}: {}", display_name(input), reason))
            ));
        }
        BatchEvent::OverallProgress {
            percent,
            completed,
            total,
        } => {
            bars.overall.set_position(u64::from(*percent));
            bars.overall.set_message(format!("{}/{}", completed, total));
        }
        BatchEvent::BatchFinished { .. } => {}
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_final(summary: &BatchSummary) {
    let report = summary.report();
    shared_utils::print_summary_report(&report);
    println!();
    if summary.interrupted {
        println!(
            "{}",
            colors::warning().apply_to(format!("⏹️  Interrupted: {}", summary.headline()))
        );
    } else {
        println!("{}", colors::success().apply_to(format!("✅ {}", summary.headline())));
    }
    println!(
        "🎞️  Converted video time: {}",
        shared_utils::format_video_time(summary.cumulative_duration_seconds)
    );
    println!("📂 Saved to: {}", summary.output_dir.display());
}

// ═══════════════════════════════════════════════════════════════
// plan
// ═══════════════════════════════════════════════════════════════

fn print_plan(input: &Path, settings: &ConversionSettings) {
    let platform: Platform = settings.platform;
    let library = params::select_library(settings.resolution, platform);
    let direct = params::select(settings.resolution, platform);
    let output = output_path::resolve(input, settings.output_dir(), settings.resolution, settings.fps);
    let args = strategy::direct::build_args(input, &output, settings);

    println!("\n🎯 Conversion Plan");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📁 File: {}", input.display());
    println!("🖥️  Platform: {}", platform);
    println!("📐 Target: {}p @ {}fps", settings.resolution, settings.fps);
    println!();
    println!(
        "1️⃣  Library: {} {} L{} {} / max {} / buf {}{}",
        library.codec,
        library.profile,
        library.level,
        library.rate.bitrate,
        library.rate.maxrate,
        library.rate.bufsize,
        library.tag.map(|t| format!(" tag {}", t)).unwrap_or_default()
    );
    println!("2️⃣  Library (minimal): {} defaults", params::VideoCodec::H264);
    println!(
        "3️⃣  Direct: {} {} L{} {} / max {} / buf {} CRF {}",
        direct.codec,
        direct.profile,
        direct.level,
        direct.rate.bitrate,
        direct.rate.maxrate,
        direct.rate.bufsize,
        direct.rate.crf
    );
    println!();
    println!("📤 Output: {}", output.display());
    println!("💻 ffmpeg {}", args.join(" "));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
