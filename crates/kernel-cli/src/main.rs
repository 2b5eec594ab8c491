//! Thin driver binary for `kernel-core`.
//!
//! Wires a real `SubstrateProbe` (reads `/proc/meminfo` and `/proc/stat`
//! where available, falling back to conservative defaults) and the system
//! clock into a `KernelLoop`, and exposes `ingest`/`sleep`/`status`/
//! `serve-ruleset` as subcommands. This is the display/diagnostics surface
//! the core itself stays out of.

mod probe;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;

use kernel_core::adapter::DataStream;
use kernel_core::cache::WorkingMemoryCache;
use kernel_core::kernel::{KernelLoop, SystemClock};
use kernel_core::metabolism::SystemMetabolism;
use kernel_core::ruleset::{Ruleset, RulesetParser};
use kernel_core::sleep::SleepCycleScheduler;
use kernel_core::substrate::{StaticSubstrateProbe, SubstrateMonitor, SubstrateProbe};

use probe::ProcSubstrateProbe;

#[derive(Parser)]
#[command(name = "kernel", about = "Cognitive kernel core driver")]
struct Cli {
    /// Path to a ruleset file. Defaults to `<project-data-dir>/default.ruleset`.
    #[arg(long, global = true)]
    ruleset: Option<PathBuf>,

    /// Emit machine-readable JSON instead of colored text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a single payload through the reflex/deep-think pipeline.
    Ingest {
        #[arg(long, default_value = "text")]
        dataset_type: String,
        #[arg(long)]
        dataset_id: String,
        payload: String,
        #[arg(long, default_value_t = 0)]
        dim_hint: usize,
    },
    /// Force a manual sleep/consolidation cycle.
    Sleep,
    /// Print the current kernel status.
    Status,
    /// Parse and pretty-print a ruleset file without running a kernel.
    ServeRuleset {
        path: PathBuf,
    },
}

fn default_ruleset_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "kernel-core", "kernel")
        .map(|dirs| dirs.data_dir().join("default.ruleset"))
}

fn load_ruleset(path: Option<&PathBuf>) -> Result<Ruleset> {
    let Some(path) = path.cloned().or_else(default_ruleset_path) else {
        return Ok(Ruleset::default());
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no ruleset file found, using defaults");
        return Ok(Ruleset::default());
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading ruleset at {}", path.display()))?;
    RulesetParser::parse(&text).with_context(|| format!("parsing ruleset at {}", path.display()))
}

fn build_probe() -> Box<dyn SubstrateProbe> {
    match ProcSubstrateProbe::new() {
        Some(p) => Box::new(p),
        None => {
            tracing::warn!("/proc substrate probe unavailable, falling back to static reading");
            Box::new(StaticSubstrateProbe::default())
        }
    }
}

fn build_kernel(probe: &dyn SubstrateProbe) -> KernelLoop {
    let reading = probe.read();
    let budget = if reading.recommended_kernel_budget > 0.0 {
        reading.recommended_kernel_budget
    } else {
        StaticSubstrateProbe::default_reading().recommended_kernel_budget
    };
    let now = Utc::now();
    KernelLoop::with_owned_hdc(
        WorkingMemoryCache::new(256),
        SystemMetabolism::configure_relative(budget, 0.28, 0.20, 0.0)
            .expect("probe budget is always positive"),
        SleepCycleScheduler::new(now, 0.15, 0.85, 3600, 600),
        SubstrateMonitor::new(reading),
        Box::new(SystemClock),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    // Loaded for ruleset-aware subcommands (`serve-ruleset` parses its own
    // path directly); kept here so a future per-tenant `ProgramManifold`
    // wiring has a validated ruleset ready to hand off.
    let _ruleset = load_ruleset(cli.ruleset.as_ref())?;
    let probe = build_probe();
    let mut kernel = build_kernel(probe.as_ref());

    match cli.command {
        Command::Ingest {
            dataset_type,
            dataset_id,
            payload,
            dim_hint,
        } => {
            let result = kernel.process_ingest_pipeline(
                Some(DataStream {
                    dataset_type,
                    dataset_id,
                    payload,
                    dim_hint,
                }),
                probe.as_ref(),
            );
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": result.success,
                        "outcome": result.outcome.as_str(),
                        "reflex_hit": result.reflex_hit,
                        "deep_think_path": result.deep_think_path,
                        "iterations": result.iterations,
                        "sleep_triggered": result.sleep_triggered,
                        "sleep_reason": result.sleep_reason.as_str(),
                        "cache_key": result.cache_key,
                        "similarity": result.similarity,
                        "energy_remaining": result.energy_remaining,
                        "error": result.error,
                    })
                );
            } else if result.success {
                println!(
                    "{} outcome={} key={} similarity={:.3} energy={:.1}",
                    "ok".green().bold(),
                    result.outcome.as_str(),
                    result.cache_key.as_deref().unwrap_or("-"),
                    result.similarity.unwrap_or(0.0),
                    result.energy_remaining
                );
            } else {
                println!(
                    "{} outcome={} error={}",
                    "failed".red().bold(),
                    result.outcome.as_str(),
                    result.error.as_deref().unwrap_or("unknown")
                );
            }
        }
        Command::Sleep => {
            kernel.trigger_sleep_cycle(kernel_core::sleep::SleepTrigger::Manual);
            let status = kernel.get_status();
            println!(
                "{} sleep_cycles={} energy={:.1}/{:.1}",
                "slept".cyan().bold(),
                status.sleep_cycles,
                status.energy_current,
                status.energy_max
            );
        }
        Command::Status => {
            let status = kernel.get_status();
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "energy_current": status.energy_current,
                        "energy_max": status.energy_max,
                        "zombie_active": status.zombie_active,
                        "sleep_cycles": status.sleep_cycles,
                        "last_trigger": status.last_trigger.as_str(),
                        "cache_len": status.cache_len,
                        "cache_capacity": status.cache_capacity,
                        "processed_inputs": status.processed_inputs,
                        "version": kernel_core::VERSION,
                    })
                );
            } else {
                println!(
                    "energy {:.1}/{:.1}  zombie={}  cache {}/{}  sleeps={}  processed={}",
                    status.energy_current,
                    status.energy_max,
                    status.zombie_active,
                    status.cache_len,
                    status.cache_capacity,
                    status.sleep_cycles,
                    status.processed_inputs
                );
            }
        }
        Command::ServeRuleset { path } => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading ruleset at {}", path.display()))?;
            let parsed = RulesetParser::parse(&text)
                .with_context(|| format!("parsing ruleset at {}", path.display()))?;
            println!(
                "constraint_mode={} symbols={} reflex_triggers={}",
                parsed.constraint_mode,
                parsed.symbol_definitions.len(),
                parsed.reflex_triggers.len()
            );
        }
    }

    Ok(())
}
