//! Telemetry source contract.
//!
//! Every getter returns `Option`: `None` means the field is unavailable this
//! tick, which is never the same thing as a zero reading. The engine degrades
//! per-field instead of failing the tick.

use serde::{Deserialize, Serialize};

/// Power source the machine is currently running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    /// External power (AC adapter).
    External,
    /// Running on battery.
    Battery,
    /// Telemetry could not determine the source.
    #[default]
    Unknown,
}

impl PowerSource {
    pub fn display_name(&self) -> &'static str {
        match self {
            PowerSource::External => "External",
            PowerSource::Battery => "Battery",
            PowerSource::Unknown => "Unknown",
        }
    }
}

/// Current and maximum charge, in mAh-scale charge units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub current_mah: i64,
    pub max_mah: i64,
}

/// Instantaneous charge/discharge rate as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRemaining {
    /// Minutes to full when charging, minutes to empty otherwise.
    pub minutes: i64,
    pub is_charging: bool,
}

/// On-demand battery telemetry.
///
/// Implementations are expected to be cheap to call once per polling tick.
/// The exception is [`official_health_percent`](Self::official_health_percent),
/// which may be expensive; the engine rate-limits it to at most one real
/// fetch per ten minutes via a cached value in scalar state.
pub trait TelemetrySource {
    /// Manufacturer-reported lifetime cycle counter.
    fn cycle_count(&self) -> Option<i64>;

    /// Current and maximum capacity.
    fn capacity(&self) -> Option<Capacity>;

    /// Manufacturer-rated capacity when new.
    fn design_capacity(&self) -> Option<i64>;

    /// Free-form health condition text.
    fn health_text(&self) -> Option<String>;

    /// "Official" health percentage from the platform's own report.
    fn official_health_percent(&self) -> Option<i64>;

    fn power_source(&self) -> PowerSource;

    fn time_remaining(&self) -> Option<TimeRemaining>;
}
