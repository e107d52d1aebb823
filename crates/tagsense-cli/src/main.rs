//! `tagsense` – command-line front end for the marker tracking stack.
//!
//! - `tagsense replay --input log.jsonl` feeds a recorded observation log
//!   through a [`TrackingSession`] and prints every event, either
//!   human-readable or as JSON [`EventEnvelope`]s (`--json`).
//! - `tagsense config` prints the effective configuration.
//!
//! Logs go to stderr (`RUST_LOG`, `TAGSENSE_LOG_FORMAT=json`); event output
//! goes to stdout.

mod replay;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tagsense_runtime::{TagsenseConfig, TrackingSession, config, telemetry};
use tagsense_types::{
    CalibrationEvent, EventEnvelope, HitEvent, LifecycleEvent, TagError, TrackingEvent, TrustEvent,
};

use crate::replay::{ReplayPlan, ReplaySummary};

#[derive(Parser)]
#[command(name = "tagsense")]
#[command(about = "Replay fiducial-marker observations through lifecycle, calibration, trust and hit validation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON Lines observation log.
    Replay(ReplayArgs),

    /// Print the effective configuration as TOML.
    Config {
        /// Config file (default: ~/.tagsense/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Path to the observation log (one `{"now", "observations"}` object per line).
    #[arg(long)]
    input: PathBuf,

    /// Config file (default: ~/.tagsense/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print events as JSON envelopes instead of text.
    #[arg(long)]
    json: bool,

    /// Run trust setup and calibration from the first frame until this time (s).
    #[arg(long)]
    setup_until: Option<f64>,

    /// Start trust monitoring at this time (s).  Defaults to --setup-until.
    #[arg(long)]
    gameplay_from: Option<f64>,
}

fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("tagsense");
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay(args) => run_replay(&args),
        Commands::Config { config } => print_config(config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// An explicit path must exist; the default path may be absent, in which case
/// defaults (plus environment overrides) are used.
fn resolve_config(path: Option<&Path>) -> Result<TagsenseConfig, TagError> {
    match path {
        Some(p) => config::load_from(p)?.ok_or_else(|| TagError::ConfigIo {
            path: p.display().to_string(),
            details: "file not found".to_string(),
        }),
        None => match config::load()? {
            Some(cfg) => Ok(cfg),
            None => {
                let mut cfg = TagsenseConfig::default();
                config::apply_env_overrides(&mut cfg);
                Ok(cfg)
            }
        },
    }
}

fn print_config(path: Option<&Path>) -> Result<(), TagError> {
    let cfg = resolve_config(path)?;
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}

fn run_replay(args: &ReplayArgs) -> Result<(), TagError> {
    let cfg = resolve_config(args.config.as_deref())?;

    let file = File::open(&args.input).map_err(|e| TagError::ReplayParse {
        line: 0,
        details: format!("cannot open {}: {e}", args.input.display()),
    })?;
    let frames = replay::parse_frames(BufReader::new(file))?;

    let plan = ReplayPlan {
        setup_until: args.setup_until,
        gameplay_from: args.gameplay_from,
    };
    let mut session = TrackingSession::new(cfg);
    let json = args.json;

    let summary = replay::run(&mut session, &frames, plan, |now, event| {
        if json {
            let envelope = EventEnvelope::new(event.source(), now, event.clone());
            match serde_json::to_string(&envelope) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to serialise event"),
            }
        } else {
            println!("{:>9.3}  {}", now, describe(event));
        }
    });

    if !json {
        print_summary(&summary);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn describe(event: &TrackingEvent) -> String {
    match event {
        TrackingEvent::Lifecycle(LifecycleEvent::Added(e)) => {
            format!("{} {}", "added".green(), e.identity.bold())
        }
        TrackingEvent::Lifecycle(LifecycleEvent::Updated(e)) => {
            format!("{} {}", "updated".dimmed(), e.identity)
        }
        TrackingEvent::Lifecycle(LifecycleEvent::Lost(e)) => format!(
            "{} {} (last seen {:.3})",
            "lost".yellow(),
            e.identity.bold(),
            e.last_seen_timestamp
        ),
        TrackingEvent::Calibration(CalibrationEvent::CollectingStarted) => {
            "calibration collecting".cyan().to_string()
        }
        TrackingEvent::Calibration(CalibrationEvent::CollectionAborted) => {
            "calibration aborted".yellow().to_string()
        }
        TrackingEvent::Calibration(CalibrationEvent::PoseLocked(p)) => format!(
            "{} {} at ({:.3}, {:.3}, {:.3})",
            "locked".cyan(),
            p.identity.bold(),
            p.position.x,
            p.position.y,
            p.position.z
        ),
        TrackingEvent::Calibration(CalibrationEvent::LockFailed) => {
            "calibration failed: nothing locked".red().to_string()
        }
        TrackingEvent::Trust(TrustEvent::TrustChanged(v)) => format!("{} {v:.2}", "trust".blue()),
        TrackingEvent::Trust(TrustEvent::TrustLow) => "trust low".red().to_string(),
        TrackingEvent::Hit(HitEvent::HitSuccess(id)) => {
            format!("{} {}", "HIT".green().bold(), id.bold())
        }
    }
}

fn print_summary(summary: &ReplaySummary) {
    println!();
    println!("  {}", "Replay summary".bold());
    println!("    frames        {}", summary.frames);
    println!("    events        {}", summary.events);
    println!("    detections    {}", summary.detections);
    println!("    hits          {}", summary.hits.to_string().green());
    println!("    locked poses  {}", summary.locked_poses);
    println!("    final trust   {:.2}", summary.final_trust);
}
