//! Golf swing capture: replays a recorded landmark session through the swing
//! detector and saves a clip plus coaching feedback for every swing.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use swing_capture::app::{ClipOutcome, SessionSummary, SwingCaptureApp};
use swing_capture::buffer::frame::FrameDimensions;
use swing_capture::config::{Config, EXAMPLE_CONFIG};
use swing_capture::replay::LandmarkReplay;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Landmark session to replay (JSON lines)
    #[arg(short, long, required_unless_present = "print_config")]
    landmarks: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Directory clips are written to (overrides the configuration)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Landmark filter, e.g. "exponential:0.3" or "none"
    #[arg(short, long)]
    filter: Option<String>,

    /// Analyze swings without encoding clips
    #[arg(long)]
    no_clips: bool,

    /// Print the session summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(dir) = args.output_dir {
        config.buffer.output_dir = dir;
    }
    if let Some(filter) = args.filter {
        match filter.split_once(':') {
            Some((kind, alpha)) => {
                config.smoothing.filter = kind.to_string();
                config.smoothing.alpha = alpha.parse().with_context(|| format!("Invalid filter alpha '{alpha}'"))?;
            }
            None => config.smoothing.filter = filter,
        }
    }
    config.validate()?;

    let Some(session_path) = args.landmarks else {
        anyhow::bail!("--landmarks is required");
    };
    let replay = LandmarkReplay::from_file(&session_path)
        .with_context(|| format!("Failed to read landmark session {}", session_path.display()))?;
    if replay.is_empty() {
        warn!("Landmark session {} is empty", session_path.display());
    }

    let dimensions = FrameDimensions::new(config.replay.width, config.replay.height);
    let (mut frames, mut detector) = replay.into_ports(dimensions);

    let mut app = SwingCaptureApp::new(config, !args.no_clips)?;
    let summary = app.run(&mut frames, &mut detector)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "Processed {} frames ({} with a pose, {} without)",
        summary.frames, summary.detections, summary.missed_detections
    );
    if summary.swings.is_empty() {
        println!("No swings detected");
        return;
    }

    for swing in &summary.swings {
        println!(
            "Swing {}: {} frames over {:.2}s{}",
            swing.attempt,
            swing.recorded_frames,
            swing.duration.as_secs_f64(),
            if swing.timed_out { " (timed out)" } else { "" }
        );
        match &swing.feedback {
            Some(feedback) => println!(
                "  {} [{}, {}/10]: {}",
                feedback.title, feedback.segment, feedback.confidence, feedback.instruction
            ),
            None => println!("  Too short to analyze"),
        }
        match &swing.clip {
            ClipOutcome::Saved { path } => println!("  Clip: {}", path.display()),
            ClipOutcome::Failed { reason } => println!("  Could not save clip: {reason}"),
            ClipOutcome::Pending => println!("  Clip still encoding"),
            ClipOutcome::Skipped => {}
        }
    }
}
