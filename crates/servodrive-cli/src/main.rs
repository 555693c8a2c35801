//! `servodrive` – headless actuator simulation runner
//!
//! This binary drives the `servodrive-hal` control core without a physics
//! host.  It:
//!
//! 1. Loads a TOML scenario (`servodrive.toml` by default) or falls back to
//!    the built-in defaults.
//! 2. Waits (bounded) for the simulated host joints to come up.
//! 3. Runs a fixed-step simulation of one PID servo and a differential drive,
//!    printing per-tick telemetry.
//! 4. Intercepts **Ctrl-C** to issue an `AllStop` intent and exit cleanly.

mod config;
mod run;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use run::Output;

#[derive(Debug, Parser)]
#[command(name = "servodrive", version, about = "Headless servo and differential-drive simulation")]
struct Args {
    /// Scenario file; defaults to ./servodrive.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run after t = 0 (overrides sim.duration_s).
    #[arg(long)]
    steps: Option<u64>,

    /// Emit one JSON telemetry object per tick.
    #[arg(long)]
    json: bool,

    /// Print a text line every N ticks.
    #[arg(long, default_value_t = 10)]
    every: u64,

    /// Write the default scenario to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_default: Option<PathBuf>,
}

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); SERVODRIVE_LOG_FORMAT=json
    // switches to newline-delimited JSON.  Logs go to stderr so telemetry on
    // stdout stays machine-readable.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("SERVODRIVE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let args = Args::parse();

    if let Some(path) = &args.write_default {
        return match config::save_to(&config::Config::default(), path) {
            Ok(()) => {
                println!("{} Default scenario written to {}", "✓".green().bold(), path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    if !args.json {
        print_banner();
    }

    // ── Scenario ──────────────────────────────────────────────────────────
    let path = args.config.clone().unwrap_or_else(config::default_path);
    let cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            if !args.json {
                println!("  Scenario loaded from {}", path.display().to_string().bold());
            }
            cfg
        }
        Ok(None) if args.config.is_some() => {
            eprintln!("{}: {} does not exist", "Config error".red(), path.display());
            return ExitCode::FAILURE;
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            if !args.json {
                println!("  No scenario file found; using built-in defaults.");
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let steps = match args.steps {
        Some(steps) => steps,
        None => match cfg.sim.steps() {
            Ok(steps) => steps,
            Err(e) => {
                eprintln!("{}: {}", "Config error".red(), e);
                return ExitCode::FAILURE;
            }
        },
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("{}", "⚠  Ctrl-C received – stopping all actuators …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will abort without AllStop");
    }

    // ── Simulation ────────────────────────────────────────────────────────
    let output = if args.json {
        Output::Json
    } else {
        Output::Text { every: args.every }
    };
    let mut stdout = std::io::stdout().lock();
    match run::run(&cfg, steps, output, &shutdown, &mut stdout) {
        Ok(summary) => {
            if !args.json {
                print_summary(&summary);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "simulation aborted");
            eprintln!("{}: {}", "Simulation error".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "servodrive".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  PID servo + differential drive, headless");
    println!();
}

fn print_summary(summary: &run::Summary) {
    println!();
    if summary.stopped_early {
        println!("  {} after {} tick(s)", "Stopped".yellow().bold(), summary.ticks);
    } else {
        println!("  {} {} tick(s)", "✓".green().bold(), summary.ticks);
    }
    if let Some(last) = &summary.last {
        for (id, pose) in &last.servo_poses {
            println!("    {:<12} {:+.4} rad", id, pose);
        }
        if let Some(enc) = last.encoders {
            println!("    {:<12} L={:+.3} R={:+.3} rad/s", "encoders", enc.left, enc.right);
        }
    }
}
