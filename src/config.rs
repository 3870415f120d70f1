//! # Benchmark Configuration
//!
//! The run is described by a JSON document, read from a file or stdin:
//!
//! ```json
//! {
//!   "targets": [{ "name": "edge-1", "address": "192.0.2.10:443" }],
//!   "sni": "example.com",
//!   "version": "tls13",
//!   "allow_downgrade": false,
//!   "insecure_skip_verify": false,
//!   "parallel": 0,
//!   "timeout": "5s",
//!   "repeats": 100
//! }
//! ```
//!
//! PascalCase keys (`Targets`, `SNI`, `Version`, ...) are accepted too.
//! Anything malformed here is a startup fault: the run never starts.

use crate::cli::{parse_duration, Args};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// A benchmark target: display name plus `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Address")]
    pub address: String,
}

/// Highest TLS version offered by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "tls12")]
    Tls12,
    #[serde(rename = "tls13")]
    Tls13,
}

impl ProtocolVersion {
    pub fn rustls_version(self) -> &'static rustls::SupportedProtocolVersion {
        match self {
            ProtocolVersion::Tls12 => &rustls::version::TLS12,
            ProtocolVersion::Tls13 => &rustls::version::TLS13,
        }
    }

    pub fn from_rustls(version: rustls::ProtocolVersion) -> Option<Self> {
        match version {
            rustls::ProtocolVersion::TLSv1_2 => Some(ProtocolVersion::Tls12),
            rustls::ProtocolVersion::TLSv1_3 => Some(ProtocolVersion::Tls13),
            _ => None,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tls12" => Ok(ProtocolVersion::Tls12),
            "tls13" => Ok(ProtocolVersion::Tls13),
            other => Err(ConfigError::Version(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::Tls12 => write!(f, "tls12"),
            ProtocolVersion::Tls13 => write!(f, "tls13"),
        }
    }
}

/// The document exactly as written, before validation
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(alias = "Targets")]
    targets: Vec<Target>,
    #[serde(default, alias = "SNI")]
    sni: String,
    #[serde(alias = "Version")]
    version: String,
    #[serde(default, alias = "AllowDowngrade")]
    allow_downgrade: bool,
    #[serde(default, alias = "InsecureSkipVerify")]
    insecure_skip_verify: bool,
    #[serde(default, alias = "Parallel")]
    parallel: usize,
    #[serde(alias = "Timeout")]
    timeout: String,
    #[serde(default = "default_repeats", alias = "Repeats")]
    repeats: usize,
    #[serde(default, alias = "Profile")]
    profile: bool,
    #[serde(default, alias = "QueueDepth")]
    queue_depth: Option<usize>,
}

fn default_repeats() -> usize {
    crate::defaults::REPEATS
}

/// Validated benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub targets: Vec<Target>,
    /// Server name sent in the ClientHello; empty means each target's host
    pub sni: String,
    pub version: ProtocolVersion,
    pub allow_downgrade: bool,
    pub insecure_skip_verify: bool,
    /// Requested worker count; 0 means one per available CPU
    pub parallel: usize,
    pub timeout: Duration,
    pub repeats: usize,
    pub profile: bool,
    pub queue_depth: Option<usize>,
}

impl BenchConfig {
    fn from_document(doc: ConfigDocument) -> Result<Self, ConfigError> {
        let version = doc.version.parse()?;
        let timeout = parse_duration(&doc.timeout).map_err(|reason| ConfigError::Timeout {
            value: doc.timeout.clone(),
            reason,
        })?;
        if timeout.is_zero() {
            return Err(ConfigError::Timeout {
                value: doc.timeout,
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        if doc.queue_depth == Some(0) {
            return Err(ConfigError::Invalid(
                "queue_depth must be at least 1".to_string(),
            ));
        }
        if let Some(target) = doc.targets.iter().find(|t| t.address.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "target {:?} has no address",
                target.name
            )));
        }

        Ok(Self {
            targets: doc.targets,
            sni: doc.sni,
            version,
            allow_downgrade: doc.allow_downgrade,
            insecure_skip_verify: doc.insecure_skip_verify,
            parallel: doc.parallel,
            timeout,
            repeats: doc.repeats,
            profile: doc.profile,
            queue_depth: doc.queue_depth,
        })
    }

    /// Parse and validate a JSON document
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let doc: ConfigDocument = serde_json::from_reader(reader)?;
        Self::from_document(doc)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Apply command-line overrides
    pub fn apply_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        if let Some(parallel) = args.parallel {
            self.parallel = parallel;
        }
        if let Some(depth) = args.queue_depth {
            if depth == 0 {
                return Err(ConfigError::Invalid(
                    "--queue-depth must be at least 1".to_string(),
                ));
            }
            self.queue_depth = Some(depth);
        }
        Ok(())
    }

    /// Effective number of workers
    pub fn workers(&self) -> usize {
        if self.parallel == 0 {
            crate::utils::get_cpu_cores()
        } else {
            self.parallel
        }
    }

    /// Capacity of the job queue between the dispatcher and the workers
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or_else(|| self.workers()).max(1)
    }

    pub fn total_jobs(&self) -> usize {
        self.targets.len() * self.repeats
    }
}
