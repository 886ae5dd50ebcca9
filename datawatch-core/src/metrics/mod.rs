//! Metric sources consumed by the monitor evaluators.
//!
//! A metric source binds a row store, a collection, and a concrete dataset at
//! construction time and computes one named statistic per requested dimension
//! as of evaluation time. The numeric aggregation itself happens in the row
//! store; this module owns the contract and the window arithmetic.

mod data_metrics;

pub use data_metrics::{CountEmptyHistogram, UniqueValueCountHistogram};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{DataWatchError, Result};

/// Empty-value statistics for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmptyValueStats {
    /// Rows with a null or empty value for the dimension
    pub empty_count: u64,
    /// `empty_count` as a percentage of `total_count` (0.0 for an empty
    /// dataset)
    pub empty_percentage: f64,
    /// Rows carrying the dimension within the window
    pub total_count: u64,
}

impl EmptyValueStats {
    /// Builds stats from raw counts, deriving the percentage.
    pub fn from_counts(empty_count: u64, total_count: u64) -> Self {
        let empty_percentage = if total_count == 0 {
            0.0
        } else {
            empty_count as f64 / total_count as f64 * 100.0
        };
        Self {
            empty_count,
            empty_percentage,
            total_count,
        }
    }

    /// Zeroed stats for a dataset with no rows.
    pub fn zeroed() -> Self {
        Self::from_counts(0, 0)
    }
}

/// Parses an evaluation window label into a duration.
///
/// Supported suffixes: `m` (minutes), `h` (hours), `d` (days), `w` (weeks),
/// e.g. `30m`, `24h`, `7d`, `2w`.
///
/// # Errors
/// Returns a configuration error for an empty label, an unknown suffix, or a
/// non-positive amount.
pub fn window_duration(label: &str) -> Result<Duration> {
    let label = label.trim();
    let Some(unit) = label.chars().last() else {
        return Err(DataWatchError::configuration(
            "Evaluation window label must not be empty",
        ));
    };
    let amount: i64 = label[..label.len() - unit.len_utf8()].parse().map_err(|_| {
        DataWatchError::configuration(format!("Invalid evaluation window label: {label:?}"))
    })?;
    if amount <= 0 {
        return Err(DataWatchError::configuration(format!(
            "Evaluation window must be positive: {label:?}"
        )));
    }
    match unit {
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        'w' => Ok(Duration::weeks(amount)),
        _ => Err(DataWatchError::configuration(format!(
            "Unknown evaluation window unit: {label:?}"
        ))),
    }
}
