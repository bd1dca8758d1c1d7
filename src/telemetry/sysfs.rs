//! Battery telemetry from Linux sysfs.
//!
//! Charge files (`charge_*`) report µAh and map directly to the engine's mAh
//! units after division; on firmware exposing only `energy_*` (µWh) the same
//! division is applied, which keeps ratios (health, raw cycles) exact even
//! though the absolute unit is then mWh.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use cycletrack_core::telemetry::{Capacity, PowerSource, TelemetrySource, TimeRemaining};

/// Telemetry backed by `/sys/class/power_supply`.
#[derive(Debug, Clone)]
pub struct SysfsTelemetry {
    battery: PathBuf,
    mains: Option<PathBuf>,
}

impl SysfsTelemetry {
    /// Scan `/sys/class/power_supply` for a battery and (optionally) mains.
    pub fn discover() -> Option<Self> {
        Self::discover_from(Path::new("/sys/class/power_supply"))
    }

    /// Scan an alternate sysfs root; used by tests and `battery_path` config.
    pub fn discover_from(root: &Path) -> Option<Self> {
        let mut battery = None;
        let mut mains = None;
        for entry in fs::read_dir(root).ok()?.flatten() {
            let path = entry.path();
            match fs::read_to_string(path.join("type")) {
                Ok(kind) => match kind.trim() {
                    "Battery" if battery.is_none() => battery = Some(path),
                    "Mains" if mains.is_none() => mains = Some(path),
                    _ => {}
                },
                Err(err) => debug!("skipping {}: {err}", path.display()),
            }
        }
        battery.map(|battery| Self { battery, mains })
    }

    /// Use an explicit battery directory, discovering mains next to it.
    pub fn with_battery_path(battery: PathBuf) -> Self {
        let mains = battery
            .parent()
            .and_then(|root| Self::discover_from(root))
            .and_then(|t| t.mains);
        Self { battery, mains }
    }

    #[cfg(test)]
    fn with_paths(battery: PathBuf, mains: Option<PathBuf>) -> Self {
        Self { battery, mains }
    }

    fn read_i64(&self, name: &str) -> Option<i64> {
        let file = self.battery.join(name);
        fs::read_to_string(&file).ok()?.trim().parse().ok()
    }

    fn read_string(&self, name: &str) -> Option<String> {
        let content = fs::read_to_string(self.battery.join(name)).ok()?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Current/full charge, preferring `charge_*` over the `energy_*` fallback.
    fn charge_pair(&self) -> Option<(i64, i64)> {
        if let (Some(now), Some(full)) = (self.read_i64("charge_now"), self.read_i64("charge_full"))
        {
            return Some((now, full));
        }
        match (self.read_i64("energy_now"), self.read_i64("energy_full")) {
            (Some(now), Some(full)) => Some((now, full)),
            _ => None,
        }
    }

    fn design_raw(&self) -> Option<i64> {
        self.read_i64("charge_full_design")
            .or_else(|| self.read_i64("energy_full_design"))
    }

    /// Instantaneous drain/charge rate in the same raw unit per hour.
    fn rate_raw(&self) -> Option<i64> {
        self.read_i64("current_now")
            .or_else(|| self.read_i64("power_now"))
            .map(i64::abs)
            .filter(|rate| *rate > 0)
    }
}

/// µ-units to milli-units.
fn to_milli(raw: i64) -> i64 {
    raw / 1000
}

impl TelemetrySource for SysfsTelemetry {
    fn cycle_count(&self) -> Option<i64> {
        self.read_i64("cycle_count").filter(|count| *count >= 0)
    }

    fn capacity(&self) -> Option<Capacity> {
        let (now, full) = self.charge_pair()?;
        Some(Capacity {
            current_mah: to_milli(now),
            max_mah: to_milli(full),
        })
    }

    fn design_capacity(&self) -> Option<i64> {
        self.design_raw().map(to_milli).filter(|design| *design > 0)
    }

    fn health_text(&self) -> Option<String> {
        if let Some(level) = self.read_string("capacity_level") {
            return Some(level);
        }
        // Derive a rough condition from full vs. design capacity.
        let (_, full) = self.charge_pair()?;
        let design = self.design_raw().filter(|d| *d > 0)?;
        let percent = full * 100 / design;
        Some(
            match percent {
                80.. => "Good",
                60..=79 => "Fair",
                _ => "Poor",
            }
            .to_string(),
        )
    }

    fn official_health_percent(&self) -> Option<i64> {
        let (_, full) = self.charge_pair()?;
        let design = self.design_raw().filter(|d| *d > 0)?;
        Some((full * 100 / design).clamp(0, 100))
    }

    fn power_source(&self) -> PowerSource {
        if let Some(ref mains) = self.mains {
            if let Ok(online) = fs::read_to_string(mains.join("online")) {
                return match online.trim() {
                    "1" => PowerSource::External,
                    "0" => PowerSource::Battery,
                    _ => PowerSource::Unknown,
                };
            }
        }
        match self.read_string("status").as_deref() {
            Some("Discharging") => PowerSource::Battery,
            Some("Charging") | Some("Full") | Some("Not charging") => PowerSource::External,
            _ => PowerSource::Unknown,
        }
    }

    fn time_remaining(&self) -> Option<TimeRemaining> {
        let status = self.read_string("status")?;
        let (now, full) = self.charge_pair()?;
        let rate = self.rate_raw()?;
        match status.as_str() {
            "Discharging" => Some(TimeRemaining {
                minutes: now * 60 / rate,
                is_charging: false,
            }),
            "Charging" => Some(TimeRemaining {
                minutes: (full - now).max(0) * 60 / rate,
                is_charging: true,
            }),
            _ => None,
        }
    }
}
