//! Billing simulator CLI: feed a request log through the processor.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use billing::RequestProcessor;
use cirrus_core::{Request, Timestamp};
use clap::{Parser, Subcommand};
use plan::PlanConfig;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use telemetry::OutcomeMetrics;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cirrus-sim", about = "Simulate metered billing over a request log")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process requests and print one result line per request
    Run {
        /// Request log; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Plan configuration (YAML)
        #[arg(short, long, env = "CIRRUS_PLAN_PATH")]
        config: Option<PathBuf>,
        /// Write results here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Parse a request log and print summary stats as JSON
    Inspect {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    telemetry::init_json_logging();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run { input, config, out } => {
            cmd_run(input.as_deref(), config.as_deref(), out.as_deref())?;
        }
        Command::Inspect { input } => {
            let summary = cmd_inspect(input.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

fn open_input(input: Option<&Path>) -> Result<Box<dyn BufRead>> {
    Ok(match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Parse every non-blank line; the first malformed line aborts with its line number.
fn parse_requests<R: BufRead>(reader: R) -> Result<Vec<Request>> {
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let req = Request::parse_line(&line).with_context(|| format!("line {}", idx + 1))?;
        out.push(req);
    }
    Ok(out)
}

fn load_config(path: Option<&Path>) -> Result<PlanConfig> {
    match path {
        Some(p) => PlanConfig::from_yaml_path(p)
            .with_context(|| format!("loading plan config {}", p.display())),
        None => Ok(PlanConfig::default()),
    }
}

fn simulate(requests: &[Request], cfg: &PlanConfig) -> (Vec<String>, OutcomeMetrics) {
    let metrics = OutcomeMetrics::new();
    let mut processor = RequestProcessor::new(cfg).with_metrics(metrics.clone());
    let lines = processor.run(requests).iter().map(ToString::to_string).collect();
    (lines, metrics)
}

fn cmd_run(input: Option<&Path>, config: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let requests = parse_requests(open_input(input)?)?;
    let (lines, metrics) = simulate(&requests, &cfg);

    let mut sink: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for line in &lines {
        writeln!(sink, "{line}")?;
    }
    sink.flush()?;

    let (accepted, rejected) = metrics.snapshot();
    info!(requests = requests.len(), accepted, rejected, "simulation complete");
    Ok(())
}

fn cmd_inspect(input: Option<&Path>) -> Result<Value> {
    let requests = parse_requests(open_input(input)?)?;
    let mut by_kind = BTreeMap::<String, usize>::new();
    for req in &requests {
        *by_kind.entry(req.kind().to_string()).or_default() += 1;
    }
    let stamps: Vec<Timestamp> = requests.iter().filter_map(Request::timestamp).collect();
    Ok(json!({
        "total": requests.len(),
        "by_kind": by_kind,
        "first_timestamp": stamps.iter().min().map(ToString::to_string),
        "last_timestamp": stamps.iter().max().map(ToString::to_string),
    }))
}
