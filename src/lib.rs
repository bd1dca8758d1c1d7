//! Host side of the cycletrack binary: configuration, sysfs telemetry, the
//! polling loop, and plain-text reporting. All accounting lives in
//! [`cycletrack_core`].

pub mod config;
pub mod monitor;
pub mod report;
pub mod telemetry;
