//! # Worker Pool
//!
//! A fixed set of tokio tasks draining one bounded queue. The dispatcher
//! enqueues jobs in order and blocks whenever the queue is full, so at most
//! `queue_depth` jobs wait while `workers` jobs are in progress. Once every
//! job is enqueued the sending side is dropped; workers exit when the queue
//! is closed and empty, and `run` returns after all of them have exited.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    queue_depth: usize,
}

impl WorkerPool {
    /// Both values are raised to at least one.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_depth: queue_depth.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// Feed `jobs` to the workers, running `handler` once per job.
    ///
    /// Returns the number of jobs handled. A worker that panics surfaces here
    /// as an error after the remaining workers have drained the queue.
    pub async fn run<T, I, F, Fut>(&self, jobs: I, handler: F) -> Result<usize>
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>(self.queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let rx = rx.clone();
            let handler = handler.clone();
            workers.spawn(async move {
                let mut handled = 0usize;
                loop {
                    // Hold the receiver only while waiting for the next job.
                    let next = rx.lock().await.recv().await;
                    match next {
                        Some(job) => {
                            handler(job).await;
                            handled += 1;
                        }
                        None => break,
                    }
                }
                debug!("Worker {} exiting after {} jobs", id, handled);
                handled
            });
        }

        let mut enqueued = 0usize;
        for job in jobs {
            if tx.send(job).await.is_err() {
                // Every worker is gone; the join below reports why.
                break;
            }
            enqueued += 1;
        }
        drop(tx);
        debug!("Enqueued {} jobs for {} workers", enqueued, self.workers);

        let mut handled = 0usize;
        while let Some(result) = workers.join_next().await {
            handled += result.context("worker task failed")?;
        }
        Ok(handled)
    }
}
