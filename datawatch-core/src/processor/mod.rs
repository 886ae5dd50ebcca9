//! Monitor processing: evaluation, deduplication, alerting, bookkeeping.

mod monitor_processor;

pub use monitor_processor::MonitorProcessor;
