use crate::collector::{Collector, Quantity};
use crate::config::{BenchConfig, ProtocolVersion};
use crate::error::ReportError;
use crate::histogram::{BucketScale, Histogram};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Parameters echoed at the top of the report and in the JSON results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    pub version: ProtocolVersion,
    pub allow_downgrade: bool,
    pub sni: String,
    /// Effective worker count
    pub parallel: usize,
    pub targets: usize,
    pub repeats: usize,
    pub scale: BucketScale,
}

impl RunParameters {
    pub fn new(config: &BenchConfig, scale: BucketScale) -> Self {
        Self {
            version: config.version,
            allow_downgrade: config.allow_downgrade,
            sni: config.sni.clone(),
            parallel: config.workers(),
            targets: config.targets.len(),
            repeats: config.repeats,
            scale,
        }
    }
}

impl fmt::Display for RunParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version: {}, AllowDowngrade: {}, SNI: {}, Parallel: {}, Targets: {}, Repeats: {}",
            self.version, self.allow_downgrade, self.sni, self.parallel, self.targets, self.repeats
        )
    }
}

/// `Fastest: .. - Slowest: ..` for one histogram; `n/a` when it is empty
pub fn extremes_line(histogram: &Histogram) -> String {
    if histogram.is_empty() {
        "Fastest: n/a - Slowest: n/a".to_string()
    } else {
        format!(
            "Fastest: {:?} - Slowest: {:?}",
            histogram.fastest(),
            histogram.slowest()
        )
    }
}

/// Write the end-of-run report: parameters, outcome counts, then one
/// histogram per measured quantity.
pub fn write_report<W: Write>(
    out: &mut W,
    params: &RunParameters,
    collector: &Collector,
    scale: BucketScale,
) -> Result<(), ReportError> {
    write!(out, "\n\n{}\n", params)?;
    writeln!(
        out,
        "Succeeded: {}, Failed: {}",
        collector.successes(),
        collector.failures()
    )?;

    for quantity in Quantity::ALL {
        let histogram = collector.histogram(quantity);
        write!(out, "\n{}:\n", quantity.title())?;
        out.write_all(histogram.render(scale)?.as_bytes())?;
        write!(out, "\n{}\n\n", extremes_line(histogram))?;
    }
    out.flush()?;
    Ok(())
}
