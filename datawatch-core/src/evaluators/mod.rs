//! Monitor evaluators.
//!
//! An evaluator is the strategy object for one evaluation metric: it is
//! constructed with the monitor condition plus the metric source(s) already
//! bound to their datasets, and produces the violations of the current pass.
//! Evaluators never resolve datasets or re-fetch metrics themselves.

mod data_quality;

pub use data_quality::{EmptyValueEvaluator, MissingValueEvaluator, NewValueEvaluator};

use async_trait::async_trait;

use crate::Result;
use crate::models::Violation;

/// Common contract of all monitor evaluators.
#[async_trait]
pub trait MonitorEvaluator: Send + Sync {
    /// Evaluates the monitor condition, returning one violation per
    /// breaching dimension in the condition's dimension order. Dimensions
    /// that do not breach produce nothing.
    async fn evaluate(&self) -> Result<Vec<Violation>>;
}
