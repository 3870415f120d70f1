use crate::histogram::BucketScale;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// TLS Bench - measure TLS handshake latency distributions across many targets
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Configuration document (JSON); read from stdin when omitted
    #[clap(short = 'c', long, help_heading = "Core Options")]
    pub config: Option<PathBuf>,

    /// Number of parallel workers, overriding the document (0 = one per CPU)
    #[clap(short = 'p', long, help_heading = "Core Options")]
    pub parallel: Option<usize>,

    /// Capacity of the job queue feeding the workers [default: worker count]
    #[clap(long)]
    pub queue_depth: Option<usize>,

    /// Render histograms with linear instead of logarithmic buckets
    #[clap(long, default_value_t = false)]
    pub linear: bool,

    /// Write a JSON summary of the run to this file
    #[clap(short = 'o', long)]
    pub output_file: Option<PathBuf>,

    /// Capture one handshake per target as a replayable byte literal instead of benchmarking
    #[clap(long, default_value_t = false)]
    pub record: bool,

    /// Directory for profiling artifacts when the document enables profiling
    #[clap(long, default_value = crate::defaults::PROFILE_DIR)]
    pub profile_dir: PathBuf,

    /// Do not draw the progress bar
    #[clap(short = 'q', long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn bucket_scale(&self) -> BucketScale {
        if self.linear {
            BucketScale::Linear
        } else {
            BucketScale::Logarithmic
        }
    }
}

/// Parse a duration string such as "5s", "300ms", "1.5s" or "1m30s".
///
/// Recognized units are `ns`, `us` (`µs`), `ms`, `s`, `m` and `h`. A bare
/// number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    if let Ok(secs) = s.parse::<f64>() {
        return nanos_to_duration(secs * 1e9, s);
    }

    let mut total_ns = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num_str, tail) = rest.split_at(num_len);
        let num: f64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("Missing unit in duration: {}", s)),
            other => return Err(format!("Invalid duration unit: {}", other)),
        };

        total_ns += num * scale;
        rest = tail;
    }

    nanos_to_duration(total_ns, s)
}

fn nanos_to_duration(ns: f64, original: &str) -> Result<Duration, String> {
    if !ns.is_finite() || ns < 0.0 || ns > u64::MAX as f64 {
        return Err(format!("Duration out of range: {}", original));
    }
    Ok(Duration::from_nanos(ns.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
    }

    #[test]
    fn test_parse_duration_fractional_and_compound() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("250µs").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("42ns").unwrap(), Duration::from_nanos(42));
        assert_eq!(parse_duration(" 2s ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("1s5").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("NaN").is_err());
    }

    #[test]
    fn test_bucket_scale_flag() {
        let args = Args::default();
        assert_eq!(args.bucket_scale(), BucketScale::Logarithmic);
        let args = Args {
            linear: true,
            ..Default::default()
        };
        assert_eq!(args.bucket_scale(), BucketScale::Linear);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["tls-bench", "-c", "bench.json", "-p", "8", "--linear"]);
        assert_eq!(args.config, Some(PathBuf::from("bench.json")));
        assert_eq!(args.parallel, Some(8));
        assert!(args.linear);
        assert!(!args.record);
        assert_eq!(args.profile_dir, PathBuf::from(crate::defaults::PROFILE_DIR));
    }
}
