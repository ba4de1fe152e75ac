//! Trace-driven DRAM controller simulator CLI.
//!
//! This binary drives an `asymdram_core` controller from the command line. It provides:
//! 1. **Run:** Replay a memory trace through the controller and print the statistics.
//! 2. **Config:** Print the effective configuration the controller was built from.

mod trace;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use asymdram_core::common::{DramError, Request, Response};
use asymdram_core::config::Config;
use asymdram_core::stats::STATS_SECTIONS;
use asymdram_core::{ControllerHub, Upstream};

use crate::trace::{TraceError, TraceRecord};

#[derive(Parser, Debug)]
#[command(
    name = "dramsim",
    author,
    version,
    about = "Cycle-level multi-channel DRAM controller simulator",
    long_about = "Replay a memory trace through the controller model, or inspect its configuration.\n\nTrace lines are \"<host-cycle> <R|W|U|E|M> <hex-address>\". Logging is controlled with RUST_LOG.\n\nExamples:\n  dramsim run --trace traces/stream.txt\n  dramsim run --config asym.json --trace traces/hot.txt --stats access,row\n  dramsim config --config asym.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace and print statistics.
    Run {
        /// JSON configuration file (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Trace to replay.
        #[arg(short, long)]
        trace: PathBuf,

        /// Stop after this many host cycles even if requests are still pending.
        #[arg(long)]
        cycles: Option<u64>,

        /// Statistics sections to print (access, row, energy); all when omitted.
        #[arg(long, value_delimiter = ',')]
        stats: Vec<String>,

        /// Print the counters as JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration.
    Config {
        /// JSON configuration file (built-in defaults when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Dram(#[from] DramError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown statistics section {0:?} (expected one of {STATS_SECTIONS:?})")]
    Section(String),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            trace,
            cycles,
            stats,
            json,
        } => cmd_run(config.as_deref(), &trace, cycles, &stats, json),
        Commands::Config { config } => cmd_config(config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, DramError> {
    match path {
        Some(path) => Config::from_json_file(path),
        None => Ok(Config::default()),
    }
}

fn cmd_config(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    let hub = ControllerHub::new(&config).map_err(DramError::from)?;
    println!("{}", serde_json::to_string_pretty(&hub.dump_configuration())?);
    Ok(())
}

/// Replays `trace` and prints the requested statistics.
fn cmd_run(
    config: Option<&Path>,
    trace: &Path,
    cycles: Option<u64>,
    sections: &[String],
    json: bool,
) -> Result<(), CliError> {
    if let Some(unknown) = sections.iter().find(|s| !STATS_SECTIONS.contains(&s.as_str())) {
        return Err(CliError::Section(unknown.clone()));
    }

    let config = load_config(config)?;
    let records = trace::load(trace)?;
    let mut hub = ControllerHub::new(&config).map_err(DramError::from)?;
    info!(trace = %trace.display(), requests = records.len(), "replaying");

    let mut upstream = TraceUpstream::default();
    let summary = replay(&mut hub, &mut upstream, &records, cycles);

    if json {
        let report = serde_json::json!({
            "cycles": summary.cycles,
            "dram_cycles": hub.dram_clock(),
            "responses": upstream.responses,
            "avg_latency": upstream.average_latency(),
            "stats": hub.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Replayed {} of {} requests in {} host cycles ({} DRAM cycles)",
            summary.injected,
            records.len(),
            summary.cycles,
            hub.dram_clock()
        );
        println!(
            "  responses: {}  average latency: {:.2} host cycles",
            upstream.responses,
            upstream.average_latency()
        );
        hub.stats().print_sections(sections);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReplaySummary {
    cycles: u64,
    injected: usize,
}

/// Feeds `records` into the hub in trace order and runs until it drains.
///
/// A record is offered no earlier than its cycle, and not while the hub has
/// signalled that it is full. A refused request is offered again next cycle.
fn replay(
    hub: &mut ControllerHub,
    upstream: &mut TraceUpstream,
    records: &[TraceRecord],
    limit: Option<u64>,
) -> ReplaySummary {
    let mut next = 0;
    let mut cycle = 0;
    while next < records.len() || hub.pending_requests() > 0 {
        if limit.is_some_and(|l| cycle >= l) {
            warn!(cycle, pending = hub.pending_requests(), "cycle limit reached");
            break;
        }
        upstream.now = cycle;

        while let Some(record) = records.get(next) {
            if record.cycle > cycle || upstream.full {
                break;
            }
            let request = Request::new(next as u64, record.address, record.op, 0);
            if !hub.handle_request(request, upstream) {
                debug!(cycle, id = request.id, "request refused");
                break;
            }
            if request.op.needs_response() {
                let _ = upstream.issued.insert(request.id, cycle);
            }
            next += 1;
        }

        hub.cycle(upstream);
        cycle += 1;
    }
    ReplaySummary {
        cycles: cycle,
        injected: next,
    }
}

/// Interconnect stand-in that accepts every response and measures latency.
#[derive(Debug, Default)]
struct TraceUpstream {
    now: u64,
    full: bool,
    issued: HashMap<u64, u64>,
    responses: u64,
    total_latency: u64,
}

impl TraceUpstream {
    fn average_latency(&self) -> f64 {
        if self.responses == 0 {
            0.0
        } else {
            self.total_latency as f64 / self.responses as f64
        }
    }
}

impl Upstream for TraceUpstream {
    fn emit_response(&mut self, response: &Response) -> bool {
        if let Some(issued) = self.issued.remove(&response.request.id) {
            self.total_latency += self.now - issued;
        }
        self.responses += 1;
        true
    }

    fn set_controller_full(&mut self, full: bool) {
        self.full = full;
    }
}
