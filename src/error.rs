//! # Error Taxonomy
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - **Startup faults** (`ConfigError`): the configuration document cannot be
//!   read or understood. These abort the process before any job runs.
//! - **Per-job faults** (`JobError`): anything that goes wrong while dialing
//!   or handshaking with one target. They are absorbed by the runner and
//!   turned into a failure line; they never reach the dispatcher.
//! - **Internal-consistency faults** (`HistogramError`): a sample landed
//!   outside the buckets computed for it. This means the bucket construction
//!   is broken, so it propagates to the top level and ends the run.
//! - **Report faults** (`ReportError`): rendering or writing the final report.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Faults detected while loading and validating the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] io::Error),

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid timeout {value:?}: {reason}")]
    Timeout { value: String, reason: String },

    #[error("unrecognized protocol version {0:?} (expected \"tls12\" or \"tls13\")")]
    Version(String),

    #[error("invalid server name {0:?}")]
    ServerName(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Faults confined to a single benchmark attempt.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("dial {address}: timed out after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    #[error("handshake deadline exceeded")]
    DeadlineExceeded,

    #[error("handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The handshake completed without the server ever sending a byte.
    #[error("handshake completed without a server response")]
    NoServerResponse,
}

/// Internal-consistency faults raised while bucketing samples.
#[derive(Debug, Error)]
pub enum HistogramError {
    #[error("sample {sample:?} is higher than the last bucket bound {bound:?}")]
    SampleOutOfRange { sample: Duration, bound: Duration },
}

/// Faults raised while writing the end-of-run report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Histogram(#[from] HistogramError),

    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}
