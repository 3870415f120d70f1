//! # TLS Bench - Main Entry Point
//!
//! 1. **Initialize logging** to stderr (`RUST_LOG` or `--verbose`)
//! 2. **Load configuration** from `--config` or stdin, then apply flag overrides
//! 3. **Build the handshaker** from the TLS settings in the document
//! 4. **Record** one handshake per target when `--record` is given, or else
//! 5. **Benchmark**: run every job, print the report, optionally write JSON results
//!
//! Configuration faults and internal faults end the process with an error.
//! Failures of individual handshakes only show up as failure lines and in
//! the success/failure counts.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tls_bench::{
    benchmark::BenchmarkRunner,
    capture::record_handshake,
    cli::Args,
    config::BenchConfig,
    logging,
    profile::Profiler,
    progress::{CountingProgress, ProgressSink, TerminalProgress},
    report::{write_report, RunParameters},
    results::RunResults,
    tls::{Handshaker, RustlsHandshaker, TlsSettings},
    utils::format_duration,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = load_config(&args)?;
    info!("Configuration: {:?}", config);

    let handshaker: Arc<dyn Handshaker> = Arc::new(
        RustlsHandshaker::new(&TlsSettings::from(&config))
            .context("Failed to build TLS client configuration")?,
    );

    if args.record {
        return record(&config, handshaker.as_ref()).await;
    }

    let profiler = if config.profile {
        Some(Profiler::start(&args.profile_dir)?)
    } else {
        None
    };

    let started = Instant::now();
    let total = config.total_jobs() as u64;
    let progress: Box<dyn ProgressSink> = if args.quiet {
        Box::new(CountingProgress::new(total))
    } else {
        Box::new(TerminalProgress::stdout(total))
    };

    let runner = BenchmarkRunner::new(config.clone(), handshaker);
    let collector = runner.run(progress, Box::new(io::stdout())).await?;
    let wall_time = started.elapsed();

    let scale = args.bucket_scale();
    let params = RunParameters::new(&config, scale);
    {
        let mut stdout = io::stdout().lock();
        write_report(&mut stdout, &params, &collector, scale)?;
        stdout.flush()?;
    }

    if let Some(profiler) = profiler {
        profiler.finish()?;
    }

    if let Some(path) = &args.output_file {
        RunResults::from_collector(params, &collector, wall_time)?.write_to(path)?;
    }

    info!("TLS Bench completed in {}", format_duration(wall_time));
    Ok(())
}

/// Read the document from `--config`, or from stdin when no path is given.
fn load_config(args: &Args) -> Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => BenchConfig::from_reader(io::stdin().lock())
            .context("Failed to load configuration from stdin")?,
    };
    config.apply_args(args)?;
    Ok(config)
}

/// Capture one handshake per target; captures are printed to stderr.
async fn record(config: &BenchConfig, handshaker: &dyn Handshaker) -> Result<()> {
    for target in &config.targets {
        info!("Recording handshake with {} ({})", target.name, target.address);
        if let Err(e) =
            record_handshake(handshaker, target, config.timeout, Box::new(io::stderr())).await
        {
            warn!("Recording {} failed: {}", target.name, e);
        }
    }
    Ok(())
}
