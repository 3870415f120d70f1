//! # TLS Handshake Benchmark Library
//!
//! Measures TLS handshake latency against a set of network targets and
//! reports the distributions as text histograms.
//!
//! Every attempt yields three samples:
//!
//! - **Handshake time**: from the start of the handshake until the session is
//!   established (TCP connect excluded).
//! - **Time to ServerHello**: from the start of the handshake until the first
//!   byte arrives from the server.
//! - **Time in flight**: the sum of the gaps between each client write and
//!   the next server read, approximating the network share of the handshake.
//!
//! ## Architecture Overview
//!
//! - `config`: JSON configuration document and its validation
//! - `conn`: instrumented `AsyncRead`/`AsyncWrite` wrappers that take the timings
//! - `tls`: the `Handshaker` seam and its rustls implementation
//! - `runner`: one benchmark job (dial, instrument, handshake, record)
//! - `pool`: bounded job queue drained by a fixed set of workers
//! - `collector`: serialized recording of samples, failures and progress
//! - `histogram`: sample accumulation, bucketing and rendering
//! - `report`: the final text report; `results`: optional JSON summary
//! - `capture`: record a live handshake as a byte literal and replay it
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tls_bench::{BenchConfig, BenchmarkRunner, RustlsHandshaker, TlsSettings};
//! use tls_bench::progress::CountingProgress;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchConfig::from_path("bench.json".as_ref())?;
//!     let handshaker = Arc::new(RustlsHandshaker::new(&TlsSettings::from(&config))?);
//!
//!     let runner = BenchmarkRunner::new(config.clone(), handshaker);
//!     let progress = CountingProgress::new(config.total_jobs() as u64);
//!     let collector = runner.run(Box::new(progress), Box::new(std::io::sink())).await?;
//!
//!     println!("{} succeeded, {} failed", collector.successes(), collector.failures());
//!     Ok(())
//! }
//! ```

/// Run orchestration: builds the collector and job stream and drives the pool
pub mod benchmark;

pub mod capture;

/// Command-line interface and duration parsing
pub mod cli;

/// Serialized section shared by all workers: histograms, counters, progress
pub mod collector;

pub mod config;

/// Timing instrumentation layered over a connected byte stream
pub mod conn;

pub mod error;

/// Latency histograms with linear and logarithmic bucketing
pub mod histogram;

pub mod logging;

/// Bounded job queue and worker set
pub mod pool;

pub mod profile;

pub mod progress;

/// Human-readable end-of-run report
pub mod report;

/// Machine-readable JSON summary of a run
pub mod results;

/// A single benchmark job and the dial/handshake it performs
pub mod runner;

pub mod tls;

pub mod utils;

pub use benchmark::BenchmarkRunner;
pub use cli::Args;
pub use collector::{Collector, Quantity, SharedCollector};
pub use config::{BenchConfig, ProtocolVersion, Target};
pub use error::{ConfigError, HistogramError, JobError};
pub use histogram::{BucketScale, Histogram};
pub use runner::{HandshakeSample, Job};
pub use tls::{Handshaker, RustlsHandshaker, TlsSettings};

/// The current version of the benchmark, recorded in JSON results
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Repetitions per target when the document does not say
    pub const REPEATS: usize = 1;

    /// Where profiling artifacts go unless `--profile-dir` says otherwise
    pub const PROFILE_DIR: &str = ".";

    pub const PROFILE_FILE: &str = "tls-bench-profile.json";

    /// Width of the progress bar in cells
    pub const PROGRESS_WIDTH: usize = 40;
}
