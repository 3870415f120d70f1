use crate::error::JobError;
use crate::histogram::Histogram;
use crate::progress::ProgressSink;
use crate::runner::HandshakeSample;
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The collector behind the run-wide lock. Every histogram observation,
/// progress increment and failure line happens while holding it.
pub type SharedCollector = Arc<tokio::sync::Mutex<Collector>>;

/// The three quantities measured for each successful job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Handshake,
    ServerHello,
    InFlight,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Handshake, Quantity::ServerHello, Quantity::InFlight];

    /// Heading used in the text report
    pub fn title(self) -> &'static str {
        match self {
            Quantity::Handshake => "Handshake time",
            Quantity::ServerHello => "Time to ServerHello",
            Quantity::InFlight => "Time in flight",
        }
    }

    /// Key used in the JSON results
    pub fn key(self) -> &'static str {
        match self {
            Quantity::Handshake => "handshake",
            Quantity::ServerHello => "server_hello",
            Quantity::InFlight => "in_flight",
        }
    }
}

/// Run-wide accumulation of samples, outcome counts and progress.
pub struct Collector {
    handshake: Histogram,
    server_hello: Histogram,
    in_flight: Histogram,
    progress: Box<dyn ProgressSink>,
    output: Box<dyn Write + Send>,
    successes: usize,
    failures: usize,
}

impl Collector {
    /// `output` receives failure lines; the progress sink draws itself.
    pub fn new(progress: Box<dyn ProgressSink>, output: Box<dyn Write + Send>) -> Self {
        Self {
            handshake: Histogram::new(),
            server_hello: Histogram::new(),
            in_flight: Histogram::new(),
            progress,
            output,
            successes: 0,
            failures: 0,
        }
    }

    pub fn into_shared(self) -> SharedCollector {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Count one completed job and redraw the progress sink
    pub fn advance(&mut self) {
        self.progress.increment();
        if let Err(e) = self.progress.render() {
            warn!("Failed to render progress: {}", e);
        }
    }

    pub fn record_success(&mut self, sample: &HandshakeSample) {
        self.successes += 1;
        self.handshake.observe(sample.handshake);
        self.server_hello.observe(sample.server_hello);
        self.in_flight.observe(sample.in_flight);
    }

    /// Print a failure line above the progress bar, then redraw the bar
    pub fn record_failure(&mut self, name: &str, error: &JobError, elapsed: Duration) {
        self.failures += 1;
        debug!("Job {} failed after {:?}: {:?}", name, elapsed, error);

        let line = format!("\r\x1b[K{}: {} ({:?})\n", name.bold(), error, elapsed);
        if let Err(e) = self
            .output
            .write_all(line.as_bytes())
            .and_then(|_| self.output.flush())
        {
            warn!("Failed to write failure line for {}: {}", name, e);
        }
        if let Err(e) = self.progress.render() {
            warn!("Failed to render progress: {}", e);
        }
    }

    /// Draw the final progress state
    pub fn finish(&mut self) {
        if let Err(e) = self.progress.finish() {
            warn!("Failed to finish progress: {}", e);
        }
    }

    pub fn histogram(&self, quantity: Quantity) -> &Histogram {
        match quantity {
            Quantity::Handshake => &self.handshake,
            Quantity::ServerHello => &self.server_hello,
            Quantity::InFlight => &self.in_flight,
        }
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Jobs completed so far, as counted by the progress sink
    pub fn completed(&self) -> u64 {
        self.progress.current()
    }
}
