//! # Run Profiling
//!
//! Enabled by `"profile": true` in the configuration document. Brackets the
//! benchmark run and, when it ends, writes `tls-bench-profile.json` with the
//! wall-clock time and the process's CPU time and peak resident set size.
//! Resource usage comes from `getrusage(2)` and is omitted on platforms
//! without it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Contents of the profile artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub wall_time: Duration,
    pub resource_usage: Option<ResourceUsage>,
}

/// Process-wide counters, cumulative since process start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub user_cpu: Duration,
    pub system_cpu: Duration,
    /// As reported by the OS: kilobytes on Linux, bytes on macOS
    pub max_rss: u64,
}

pub struct Profiler {
    path: PathBuf,
    started: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl Profiler {
    /// Start profiling; the artifact will be written under `dir`.
    pub fn start(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create profile directory {}", dir.display()))?;
        let path = dir.join(crate::defaults::PROFILE_FILE);
        info!("Profiling enabled, writing to {}", path.display());
        Ok(Self {
            path,
            started: Instant::now(),
            started_at: chrono::Utc::now(),
        })
    }

    /// Stop profiling and write the artifact, returning its path.
    pub fn finish(self) -> Result<PathBuf> {
        let report = ProfileReport {
            started_at: self.started_at,
            wall_time: self.started.elapsed(),
            resource_usage: resource_usage(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write profile to {}", self.path.display()))?;
        info!("Profile written to: {:?}", self.path);
        Ok(self.path)
    }
}

#[cfg(unix)]
fn resource_usage() -> Option<ResourceUsage> {
    use nix::sys::resource::{getrusage, UsageWho};
    use nix::sys::time::{TimeVal, TimeValLike};

    let usage = match getrusage(UsageWho::RUSAGE_SELF) {
        Ok(usage) => usage,
        Err(e) => {
            warn!("getrusage failed: {}", e);
            return None;
        }
    };
    let micros = |tv: TimeVal| Duration::from_micros(tv.num_microseconds().max(0) as u64);
    Some(ResourceUsage {
        user_cpu: micros(usage.user_time()),
        system_cpu: micros(usage.system_time()),
        max_rss: usage.max_rss().max(0) as u64,
    })
}

#[cfg(not(unix))]
fn resource_usage() -> Option<ResourceUsage> {
    warn!("Resource usage is not available on this platform");
    None
}
