//! Replays recorded callback streams through the dispatcher.
//!
//! # Usage
//!
//! ```bash
//! # Print dispatch statistics and the reconstructed span tree
//! launchspan replay calls.jsonl --tree
//!
//! # Export the replayed spans to a local Zipkin collector
//! launchspan replay calls.jsonl --collector http://127.0.0.1:9411/api/v1/spans
//!
//! # Read from stdin with a config file
//! cat calls.jsonl | launchspan replay - --config tracer.toml
//! ```
//!
//! Input is one JSON `CallbackRecord` per line. Blank lines and lines starting
//! with `#` are skipped.

use clap::{Parser, Subcommand};
use launchspan::{
    CallbackRecord, Dispatcher, LaunchEvent, LaunchObserver, MemorySink, Tracer, TracerConfig,
};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "launchspan")]
#[command(about = "Kernel launch reconstruction and call-nesting spans from callback streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON-lines callback stream through a dispatcher.
    Replay {
        /// Input file, or `-` for stdin.
        input: String,

        /// Print the reconstructed span tree.
        #[arg(long)]
        tree: bool,

        /// Export spans to this Zipkin collector instead of recording them.
        #[arg(long)]
        collector: Option<String>,

        /// TOML tracer configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Launchspan(#[from] launchspan::Error),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Record {
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Default)]
struct LaunchCounter {
    launches: AtomicU64,
    unconfigured: AtomicU64,
}

impl LaunchObserver for LaunchCounter {
    fn launch_completed(&self, event: &LaunchEvent) {
        self.launches.fetch_add(1, Ordering::Relaxed);
        if !event.is_configured() {
            self.unconfigured.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(
            symbol = %event.symbol,
            span = ?event.span,
            descriptor = ?event.descriptor.as_ref().map(ToString::to_string),
            "launch completed"
        );
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            input,
            tree,
            collector,
            config,
        } => cmd_replay(&input, tree, collector, config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>, collector: Option<String>) -> Result<TracerConfig, CliError> {
    let mut config = match path {
        Some(path) => TracerConfig::from_file(path).map_err(launchspan::Error::from)?,
        None => TracerConfig::default(),
    };
    config = config
        .with_env_overrides()
        .map_err(launchspan::Error::from)?;
    if let Some(url) = collector {
        config = config.with_collector_url(url);
    }
    config.validate().map_err(launchspan::Error::from)?;
    Ok(config)
}

fn cmd_replay(
    input: &str,
    tree: bool,
    collector: Option<String>,
    config: Option<PathBuf>,
) -> Result<(), CliError> {
    let export = collector.is_some();
    let config = load_config(config, collector)?;

    let memory = Arc::new(MemorySink::new());
    let tracer = if export {
        Arc::new(Tracer::from_config(&config)?)
    } else {
        Arc::new(Tracer::new(&config, memory.clone()))
    };
    let counter = Arc::new(LaunchCounter::default());
    let dispatcher = Dispatcher::new(tracer.clone()).with_observer(counter.clone());

    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(std::fs::File::open(input)?))
    };
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: CallbackRecord = serde_json::from_str(trimmed).map_err(|source| CliError::Record {
            line: idx + 1,
            source,
        })?;
        dispatcher.dispatch(&record);
    }

    let leaked = dispatcher.release_thread_context().map_or(0, |mut ctx| dispatcher.close_unfinished(&mut ctx));
    let stats = dispatcher.stats().snapshot();
    let root = tracer.root();
    let delivered = tracer.shutdown();

    println!("records:             {}", stats.records);
    println!("spans opened:        {}", stats.spans_opened);
    println!("spans closed:        {}", stats.spans_closed);
    println!("spans unfinished:    {leaked}");
    println!(
        "launches:            {} ({} unconfigured)",
        counter.launches.load(Ordering::Relaxed),
        counter.unconfigured.load(Ordering::Relaxed)
    );
    println!("protocol violations: {}", stats.protocol_violations);
    println!("stack underflows:    {}", stats.stack_underflows);
    println!("depth exceeded:      {}", stats.depth_exceeded);
    if export {
        println!("collector drained:   {delivered}");
    } else if tree {
        println!();
        print!("{}", memory.render_tree(root));
    }
    Ok(())
}
