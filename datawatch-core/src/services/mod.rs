//! Lifecycle services over the monitor store.

mod monitor_service;

pub use monitor_service::MonitorService;
