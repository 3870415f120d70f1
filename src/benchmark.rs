//! # Benchmark Engine Module
//!
//! Orchestrates one run: builds the shared collector, expands the
//! configuration into jobs (every target once per repeat), pushes them
//! through the worker pool and hands the finished collector back for
//! reporting.
//!
//! Per-job faults are absorbed by the runner. Only faults in the machinery
//! itself (a worker task dying) make `run` fail.

use crate::collector::Collector;
use crate::config::BenchConfig;
use crate::pool::WorkerPool;
use crate::progress::ProgressSink;
use crate::runner::{run_job, schedule};
use crate::tls::Handshaker;
use anyhow::{anyhow, Result};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// Drives a full benchmark run for one configuration
pub struct BenchmarkRunner {
    config: BenchConfig,
    handshaker: Arc<dyn Handshaker>,
}

/// One-line description of the run, logged before it starts
struct BenchConfigDisplay<'a> {
    config: &'a BenchConfig,
    workers: usize,
    queue_depth: usize,
}

impl fmt::Display for BenchConfigDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Benchmarking {} targets x {} repeats ({} jobs) with {} workers, queue depth {}, timeout {:?}, {}",
            self.config.targets.len(),
            self.config.repeats,
            self.config.total_jobs(),
            self.workers,
            self.queue_depth,
            self.config.timeout,
            self.config.version
        )
    }
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig, handshaker: Arc<dyn Handshaker>) -> Self {
        Self { config, handshaker }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run every job and return the collector holding the results.
    ///
    /// `progress` is advanced once per job; `output` receives failure lines.
    pub async fn run(
        &self,
        progress: Box<dyn ProgressSink>,
        output: Box<dyn Write + Send>,
    ) -> Result<Collector> {
        let pool = WorkerPool::new(self.config.workers(), self.config.queue_depth());
        info!(
            "{}",
            BenchConfigDisplay {
                config: &self.config,
                workers: pool.workers(),
                queue_depth: pool.queue_depth(),
            }
        );

        let collector = Collector::new(progress, output).into_shared();
        let jobs = schedule(
            &self.config.targets,
            self.config.repeats,
            self.config.timeout,
            collector.clone(),
            self.handshaker.clone(),
        );
        let handled = pool.run(jobs, run_job).await?;

        let mut collector = Arc::try_unwrap(collector)
            .map_err(|_| anyhow!("collector is still shared after all workers exited"))?
            .into_inner();
        collector.finish();

        info!(
            "Benchmark completed: {} jobs, {} succeeded, {} failed",
            handled,
            collector.successes(),
            collector.failures()
        );
        Ok(collector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Quantity;
    use crate::config::Target;
    use crate::conn::BoxedIoStream;
    use crate::progress::CountingProgress;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::Ordering;

    struct UnreachableHandshaker;

    #[async_trait]
    impl Handshaker for UnreachableHandshaker {
        async fn handshake(
            &self,
            _host: &str,
            _stream: BoxedIoStream,
        ) -> io::Result<BoxedIoStream> {
            Err(io::Error::new(io::ErrorKind::Other, "not expected"))
        }
    }

    fn config_with(targets: Vec<Target>, repeats: usize, parallel: usize) -> BenchConfig {
        let doc = serde_json::json!({
            "targets": targets,
            "sni": "example.com",
            "version": "tls13",
            "timeout": "2s",
            "repeats": repeats,
            "parallel": parallel,
        });
        BenchConfig::from_reader(doc.to_string().as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_every_refused_job_counts_as_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let targets = vec![
            Target {
                name: "gone-1".to_string(),
                address: address.clone(),
            },
            Target {
                name: "gone-2".to_string(),
                address,
            },
        ];
        let config = config_with(targets, 3, 2);
        let progress = CountingProgress::new(config.total_jobs() as u64);
        let counter = progress.counter();

        let runner = BenchmarkRunner::new(config, Arc::new(UnreachableHandshaker));
        let collector = runner
            .run(Box::new(progress), Box::new(io::sink()))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::Acquire), 6);
        assert_eq!(collector.failures(), 6);
        assert_eq!(collector.successes(), 0);
        assert!(collector.histogram(Quantity::Handshake).is_empty());
    }

    #[tokio::test]
    async fn test_empty_target_list_completes() {
        let config = config_with(Vec::new(), 10, 4);
        let runner = BenchmarkRunner::new(config, Arc::new(UnreachableHandshaker));
        let collector = runner
            .run(Box::new(CountingProgress::new(0)), Box::new(io::sink()))
            .await
            .unwrap();
        assert_eq!(collector.completed(), 0);
    }
}
