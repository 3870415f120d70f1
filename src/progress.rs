//! # Progress Reporting
//!
//! The runner advances a `ProgressSink` exactly once per completed job,
//! successful or not, and asks it to redraw after every advance. All calls
//! happen inside the collector's critical section, so implementations never
//! see concurrent use.

use crate::utils::create_progress_indicator;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait ProgressSink: Send {
    /// Number of units expected in this run
    fn total(&self) -> u64;

    /// Number of units completed so far
    fn current(&self) -> u64;

    fn increment(&mut self);

    /// Redraw the current state
    fn render(&mut self) -> io::Result<()>;

    /// Draw the final state and release the line
    fn finish(&mut self) -> io::Result<()>;
}

/// Single-line progress bar redrawn in place with `\r`
pub struct TerminalProgress {
    total: u64,
    current: u64,
    width: usize,
    out: Box<dyn Write + Send>,
}

impl TerminalProgress {
    pub fn new(total: u64, out: Box<dyn Write + Send>) -> Self {
        Self {
            total,
            current: 0,
            width: crate::defaults::PROGRESS_WIDTH,
            out,
        }
    }

    pub fn stdout(total: u64) -> Self {
        Self::new(total, Box::new(io::stdout()))
    }

    /// The bar as it would currently be drawn, without the line reset
    pub fn line(&self) -> String {
        let percent = if self.total == 0 {
            100.0
        } else {
            self.current as f64 * 100.0 / self.total as f64
        };
        format!(
            "{} / {} {} {:.2}%",
            self.current,
            self.total,
            create_progress_indicator(self.current as usize, self.total as usize, self.width),
            percent
        )
    }
}

impl ProgressSink for TerminalProgress {
    fn total(&self) -> u64 {
        self.total
    }

    fn current(&self) -> u64 {
        self.current
    }

    fn increment(&mut self) {
        self.current += 1;
    }

    fn render(&mut self) -> io::Result<()> {
        let line = self.line();
        write!(self.out, "\r\x1b[K{}", line)?;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.render()?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Progress sink that draws nothing, only counting completed units.
///
/// The counter handle can be kept by the caller to observe progress.
#[derive(Debug, Clone, Default)]
pub struct CountingProgress {
    total: u64,
    completed: Arc<AtomicU64>,
}

impl CountingProgress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicU64> {
        self.completed.clone()
    }
}

impl ProgressSink for CountingProgress {
    fn total(&self) -> u64 {
        self.total
    }

    fn current(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn increment(&mut self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    fn render(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
