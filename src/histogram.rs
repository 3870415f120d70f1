//! # Latency Histogram
//!
//! Accumulates raw duration samples for one measured quantity and renders
//! them as an eight-bucket text distribution.
//!
//! Two bucketing strategies are supported:
//!
//! - **Linear**: equal-width buckets from the fastest to the slowest sample.
//! - **Logarithmic**: bucket bounds are filled from the slowest end, halving
//!   the span at each step, so resolution is concentrated near the fastest
//!   samples. Handshake latencies are usually tight at the fast end with a
//!   long slow tail, which is what this strategy is for.
//!
//! Raw samples are kept (rather than folded into an HDR histogram up front)
//! because the bucket bounds depend on the final fastest/slowest values.
//! HDR histograms are only used to derive the percentile summary.

use crate::error::HistogramError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of buckets in every rendered distribution.
pub const BUCKET_COUNT: usize = 8;

/// Length of the bar drawn for the most populated bucket.
pub const BAR_WIDTH: usize = 40;

const BAR_CHAR: &str = "∎";

/// Percentiles reported in every `LatencySummary`.
pub const SUMMARY_PERCENTILES: [f64; 3] = [50.0, 90.0, 99.0];

/// Strategy used to place bucket upper bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketScale {
    Linear,
    #[default]
    Logarithmic,
}

impl std::fmt::Display for BucketScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketScale::Linear => write!(f, "linear"),
            BucketScale::Logarithmic => write!(f, "logarithmic"),
        }
    }
}

/// One row of a rendered distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Upper bound of the previous bucket, or zero for the first one
    pub lower: Duration,
    /// Inclusive upper bound
    pub upper: Duration,
    pub count: usize,
}

/// Percentile value pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_ns: u64,
}

/// Statistical summary of a histogram, used for the JSON results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub fastest_ns: Option<u64>,
    pub slowest_ns: Option<u64>,
    pub mean_ns: f64,
    pub std_dev_ns: f64,
    pub percentiles: Vec<PercentileValue>,
}

/// Append-only collection of duration samples with running extremes.
///
/// After every `observe(d)` the invariant `fastest <= d <= slowest` holds.
/// A fresh histogram starts with `fastest == Duration::MAX` and
/// `slowest == Duration::ZERO`.
#[derive(Debug, Clone)]
pub struct Histogram {
    points: Vec<Duration>,
    fastest: Duration,
    slowest: Duration,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            fastest: Duration::MAX,
            slowest: Duration::ZERO,
        }
    }

    /// Record a new measurement
    pub fn observe(&mut self, d: Duration) {
        self.points.push(d);
        if d > self.slowest {
            self.slowest = d;
        }
        if d < self.fastest {
            self.fastest = d;
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn fastest(&self) -> Duration {
        self.fastest
    }

    pub fn slowest(&self) -> Duration {
        self.slowest
    }

    /// Upper bound of each bucket for the current state.
    ///
    /// An empty histogram has no meaningful range, so every bound is zero.
    pub fn upper_bounds(&self, scale: BucketScale) -> [Duration; BUCKET_COUNT] {
        let mut bounds = [Duration::ZERO; BUCKET_COUNT];
        if self.is_empty() {
            return bounds;
        }

        let range = self.slowest - self.fastest;
        match scale {
            BucketScale::Linear => {
                // Widths are whole milliseconds, rounded up, so the last
                // bound never falls short of `slowest`.
                let steps = BUCKET_COUNT as u128 - 1;
                let width_ms = range.as_nanos().div_ceil(steps * 1_000_000);
                let width = Duration::from_millis(u64::try_from(width_ms).unwrap_or(u64::MAX));
                for (i, bound) in bounds.iter_mut().enumerate() {
                    *bound = self.fastest.saturating_add(width.saturating_mul(i as u32));
                }
            }
            BucketScale::Logarithmic => {
                let mut span = range;
                for bound in bounds.iter_mut().rev() {
                    *bound = self.fastest + span;
                    span /= 2;
                }
            }
        }
        bounds
    }

    /// Bucket the samples under the given strategy.
    ///
    /// Fails only if a sample exceeds the last bucket bound, which the bound
    /// construction rules out.
    pub fn buckets(&self, scale: BucketScale) -> Result<Vec<Bucket>, HistogramError> {
        let bounds = self.upper_bounds(scale);

        let mut sorted = self.points.clone();
        sorted.sort_unstable();
        let counts = count_into(&sorted, &bounds)?;

        let mut lower = Duration::ZERO;
        Ok(bounds
            .iter()
            .zip(counts)
            .map(|(&upper, count)| {
                let bucket = Bucket {
                    lower,
                    upper,
                    count,
                };
                lower = upper;
                bucket
            })
            .collect())
    }

    /// Render the distribution as text, one line per bucket.
    ///
    /// Each line carries the bucket bounds in whole milliseconds, the sample
    /// count and a bar scaled so the fullest bucket is `BAR_WIDTH` long.
    pub fn render(&self, scale: BucketScale) -> Result<String, HistogramError> {
        let buckets = self.buckets(scale)?;
        let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);

        let mut out = String::new();
        for bucket in &buckets {
            let bar_len = if max > 0 {
                bucket.count * BAR_WIDTH / max
            } else {
                0
            };
            out.push_str(&format!(
                "  {:>3}ms - {:>3}ms [{}]\t|{}\n",
                bucket.lower.as_millis(),
                bucket.upper.as_millis(),
                bucket.count,
                BAR_CHAR.repeat(bar_len)
            ));
        }
        Ok(out)
    }

    /// Summarize the samples with an HDR histogram
    pub fn summary(&self) -> Result<LatencySummary> {
        if self.is_empty() {
            return Ok(LatencySummary {
                samples: 0,
                fastest_ns: None,
                slowest_ns: None,
                mean_ns: 0.0,
                std_dev_ns: 0.0,
                percentiles: Vec::new(),
            });
        }

        // 3 significant figures, auto-resizing
        let mut hdr = hdrhistogram::Histogram::<u64>::new(3)?;
        for &point in &self.points {
            hdr.record(nanos(point))?;
        }

        let percentiles = SUMMARY_PERCENTILES
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value_ns: hdr.value_at_percentile(p),
            })
            .collect();

        Ok(LatencySummary {
            samples: self.len(),
            fastest_ns: Some(nanos(self.fastest)),
            slowest_ns: Some(nanos(self.slowest)),
            mean_ns: hdr.mean(),
            std_dev_ns: hdr.stdev(),
            percentiles,
        })
    }
}

/// Sweep sorted samples and bucket bounds together, counting per bucket.
fn count_into(
    sorted: &[Duration],
    bounds: &[Duration; BUCKET_COUNT],
) -> Result<[usize; BUCKET_COUNT], HistogramError> {
    let mut counts = [0usize; BUCKET_COUNT];
    let mut bi = 0;
    let mut i = 0;
    while i < sorted.len() {
        if sorted[i] <= bounds[bi] {
            counts[bi] += 1;
            i += 1;
        } else if bi < BUCKET_COUNT - 1 {
            bi += 1;
        } else {
            return Err(HistogramError::SampleOutOfRange {
                sample: sorted[i],
                bound: bounds[bi],
            });
        }
    }
    Ok(counts)
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
