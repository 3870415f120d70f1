//! # Utility Functions
//!
//! Small helpers shared across the benchmark: human-readable durations,
//! CPU detection for the default worker count, run identifiers and the
//! progress bar glyphs.

use std::time::Duration;
use uuid::Uuid;

/// Generate a unique identifier for a benchmark run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Convert a duration to a human-readable string with an appropriate unit
///
/// ```rust
/// # use tls_bench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let ns = duration.as_nanos();
    if ns < 1_000 {
        format!("{}ns", ns)
    } else if ns < 1_000_000 {
        format!("{:.2}μs", ns as f64 / 1_000.0)
    } else if ns < 1_000_000_000 {
        format!("{:.2}ms", ns as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", ns as f64 / 1_000_000_000.0)
    }
}

/// Number of logical CPUs available to this process.
///
/// `num_cpus` accounts for cgroup limits and affinity masks, so this is
/// the parallelism actually available rather than the machine's core count.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Progress bar made of full blocks (done) and light shade (remaining).
///
/// A zero total draws a full bar; progress past the total is capped.
///
/// ```rust
/// # use tls_bench::utils::create_progress_indicator;
/// assert_eq!(create_progress_indicator(0, 100, 10), "░░░░░░░░░░");
/// assert_eq!(create_progress_indicator(50, 100, 10), "█████░░░░░");
/// assert_eq!(create_progress_indicator(100, 100, 10), "██████████");
/// ```
pub fn create_progress_indicator(current: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return "█".repeat(width);
    }

    let progress = (current as f64 / total as f64).min(1.0);
    let filled = ((progress * width as f64) as usize).min(width);
    let empty = width - filled;

    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
