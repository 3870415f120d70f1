use crate::collector::{Collector, Quantity};
use crate::histogram::{Bucket, LatencySummary};
use crate::report::RunParameters;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Machine-readable record of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    pub metadata: RunMetadata,
    pub parameters: RunParameters,
    pub successes: usize,
    pub failures: usize,
    /// Keyed by quantity: `handshake`, `server_hello`, `in_flight`
    pub quantities: BTreeMap<String, QuantityResults>,
}

/// Statistics for one quantity plus the buckets the report rendered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityResults {
    #[serde(flatten)]
    pub summary: LatencySummary,
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub wall_time: Duration,
    pub system_info: SystemInfo,
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: crate::utils::get_cpu_cores(),
        }
    }
}

impl RunResults {
    pub fn from_collector(
        parameters: RunParameters,
        collector: &Collector,
        wall_time: Duration,
    ) -> Result<Self> {
        let mut quantities = BTreeMap::new();
        for quantity in Quantity::ALL {
            let histogram = collector.histogram(quantity);
            let summary = histogram
                .summary()
                .with_context(|| format!("Failed to summarize {}", quantity.title()))?;
            let buckets = histogram.buckets(parameters.scale)?;
            quantities.insert(quantity.key().to_string(), QuantityResults { summary, buckets });
        }

        Ok(Self {
            metadata: RunMetadata {
                run_id: crate::utils::generate_run_id(),
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                wall_time,
                system_info: SystemInfo::current(),
            },
            parameters,
            successes: collector.successes(),
            failures: collector.failures(),
            quantities,
        })
    }

    /// Write the results as pretty-printed JSON, replacing any existing file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        info!("Results written to: {:?}", path);
        Ok(())
    }
}
