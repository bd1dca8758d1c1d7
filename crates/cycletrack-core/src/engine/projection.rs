//! Pure projection math: no store access, no state mutation beyond the
//! caller-owned last-estimate cache.

use chrono::NaiveDate;

use super::EngineConfig;
use crate::records::DailyRecord;
use crate::telemetry::{Capacity, PowerSource, TimeRemaining};

/// Platform time-to-full / time-to-empty, normalized to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeEstimate {
    Unavailable,
    ToFull { seconds: f64 },
    ToEmpty { seconds: f64 },
}

/// Time until the next cycle completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Unavailable,
    /// A live estimate from the current discharge rate or today's history.
    Estimated { seconds: f64 },
    /// On external power; the last estimate is held, frozen.
    Paused { seconds: f64 },
    /// Back on battery but no usable rate yet; showing the stale estimate.
    Calculating { seconds: f64 },
}

/// Cycles per day needed to hit the configured target by its deadline.
///
/// `None` once the deadline has passed or when the counter is unavailable.
pub(super) fn cycles_per_day_needed(
    config: &EngineConfig,
    today: NaiveDate,
    cycle_count: Option<i64>,
) -> Option<f64> {
    let count = cycle_count?;
    let days_remaining = (config.target_deadline - today).num_days();
    if days_remaining <= 0 {
        return None;
    }
    let cycles_remaining = (config.target_total_cycles - count).max(0);
    Some(cycles_remaining as f64 / days_remaining as f64)
}

/// Normalize the platform's minutes-remaining reading.
pub(super) fn time_to_full_or_empty(sample: Option<TimeRemaining>) -> TimeEstimate {
    match sample {
        Some(sample) if sample.minutes > 0 => {
            let seconds = sample.minutes as f64 * 60.0;
            if sample.is_charging {
                TimeEstimate::ToFull { seconds }
            } else {
                TimeEstimate::ToEmpty { seconds }
            }
        }
        _ => TimeEstimate::Unavailable,
    }
}

/// Seconds until charge falls to the low-charge threshold.
///
/// Only defined while discharging with a usable rate and with charge still
/// above the threshold.
pub(super) fn seconds_to_low_charge(
    config: &EngineConfig,
    sample: Option<TimeRemaining>,
    capacity: Option<Capacity>,
) -> Option<f64> {
    let sample = sample.filter(|s| !s.is_charging && s.minutes > 0)?;
    let capacity = capacity?;
    if capacity.current_mah <= 0 {
        return None;
    }
    let threshold = config.low_charge_percent / 100.0 * capacity.max_mah as f64;
    let current = capacity.current_mah as f64;
    if current <= threshold {
        return None;
    }
    // The platform's time-to-empty covers `current` mAh; scale it down to
    // the span between here and the threshold.
    Some((current - threshold) / current * sample.minutes as f64 * 60.0)
}

/// Project when the in-progress cycle will complete.
///
/// Prefers today's historical average discharge rate, falling back to the
/// instantaneous platform rate. `last_estimate` caches the most recent live
/// value so pauses and rate gaps degrade to a frozen display instead of
/// flickering to nothing.
pub(super) fn time_to_next_cycle(
    last_estimate: &mut Option<f64>,
    power_source: PowerSource,
    mah_to_next_cycle: Option<i64>,
    today_record: Option<&DailyRecord>,
    sample: Option<TimeRemaining>,
    current_capacity: Option<i64>,
) -> Projection {
    if power_source == PowerSource::External {
        return match *last_estimate {
            Some(seconds) => Projection::Paused { seconds },
            None => Projection::Unavailable,
        };
    }

    let needed = match mah_to_next_cycle {
        Some(needed) if needed > 0 => needed as f64,
        _ => return stale(*last_estimate),
    };

    // Today's observed average rate is steadier than one instantaneous
    // reading.
    if let Some(record) = today_record {
        if record.total_mah_used > 0.0 && record.time_on_battery > 0.0 {
            let rate = record.total_mah_used / record.time_on_battery;
            let seconds = needed / rate;
            *last_estimate = Some(seconds);
            return Projection::Estimated { seconds };
        }
    }

    if let (Some(sample), Some(current)) = (sample, current_capacity) {
        if !sample.is_charging && sample.minutes > 0 && current > 0 {
            let rate = current as f64 / (sample.minutes as f64 * 60.0);
            let seconds = needed / rate;
            *last_estimate = Some(seconds);
            return Projection::Estimated { seconds };
        }
    }

    stale(*last_estimate)
}

fn stale(last_estimate: Option<f64>) -> Projection {
    match last_estimate {
        Some(seconds) => Projection::Calculating { seconds },
        None => Projection::Unavailable,
    }
}

/// "3h 25m" / "45m" style rendering of a span in seconds.
pub fn format_duration(seconds: f64) -> String {
    let total_minutes = (seconds.max(0.0) / 60.0).round() as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_cycles_per_day_needed() {
        // 2026-05-22 to 2026-06-01 is 10 days.
        let needed = cycles_per_day_needed(&config(), day("2026-05-22"), Some(900));
        assert_eq!(needed, Some(10.0));

        // Target already met: zero per day, not negative.
        let needed = cycles_per_day_needed(&config(), day("2026-05-22"), Some(1200));
        assert_eq!(needed, Some(0.0));

        // Deadline passed.
        assert_eq!(cycles_per_day_needed(&config(), day("2026-06-01"), Some(900)), None);
        assert_eq!(cycles_per_day_needed(&config(), day("2026-07-01"), Some(900)), None);
    }

    #[test]
    fn test_time_to_full_or_empty() {
        assert_eq!(time_to_full_or_empty(None), TimeEstimate::Unavailable);
        assert_eq!(
            time_to_full_or_empty(Some(TimeRemaining { minutes: 0, is_charging: false })),
            TimeEstimate::Unavailable
        );
        assert_eq!(
            time_to_full_or_empty(Some(TimeRemaining { minutes: 90, is_charging: true })),
            TimeEstimate::ToFull { seconds: 5400.0 }
        );
        assert_eq!(
            time_to_full_or_empty(Some(TimeRemaining { minutes: 120, is_charging: false })),
            TimeEstimate::ToEmpty { seconds: 7200.0 }
        );
    }

    #[test]
    fn test_seconds_to_low_charge() {
        let capacity = Capacity { current_mah: 2000, max_mah: 4000 };
        let sample = TimeRemaining { minutes: 100, is_charging: false };

        // Threshold is 400 mAh; 1600 of the 2000 mAh remain above it.
        let seconds = seconds_to_low_charge(&config(), Some(sample), Some(capacity));
        assert_eq!(seconds, Some(1600.0 / 2000.0 * 6000.0));

        // Charging, or already below threshold: undefined.
        let charging = TimeRemaining { minutes: 100, is_charging: true };
        assert_eq!(seconds_to_low_charge(&config(), Some(charging), Some(capacity)), None);
        let low = Capacity { current_mah: 300, max_mah: 4000 };
        assert_eq!(seconds_to_low_charge(&config(), Some(sample), Some(low)), None);
    }

    #[test]
    fn test_next_cycle_prefers_historical_rate() {
        let mut last = None;
        let mut record = DailyRecord::new(day("2026-02-17"));
        record.total_mah_used = 900.0;
        record.time_on_battery = 3600.0;
        let sample = TimeRemaining { minutes: 60, is_charging: false };

        let projection = time_to_next_cycle(
            &mut last,
            PowerSource::Battery,
            Some(1000),
            Some(&record),
            Some(sample),
            Some(3000),
        );
        // Historical rate: 900 mAh / 3600 s = 0.25 mAh/s -> 4000 s.
        assert_eq!(projection, Projection::Estimated { seconds: 4000.0 });
        assert_eq!(last, Some(4000.0));
    }

    #[test]
    fn test_next_cycle_falls_back_to_instantaneous_rate() {
        let mut last = None;
        let sample = TimeRemaining { minutes: 100, is_charging: false };

        let projection = time_to_next_cycle(
            &mut last,
            PowerSource::Battery,
            Some(1500),
            None,
            Some(sample),
            Some(3000),
        );
        // Instantaneous rate: 3000 mAh / 6000 s = 0.5 mAh/s -> 3000 s.
        assert_eq!(projection, Projection::Estimated { seconds: 3000.0 });
    }

    #[test]
    fn test_next_cycle_pauses_on_external_power() {
        let mut last = Some(4200.0);
        let projection =
            time_to_next_cycle(&mut last, PowerSource::External, Some(1000), None, None, None);
        assert_eq!(projection, Projection::Paused { seconds: 4200.0 });

        let mut no_history = None;
        let projection =
            time_to_next_cycle(&mut no_history, PowerSource::External, Some(1000), None, None, None);
        assert_eq!(projection, Projection::Unavailable);
    }

    #[test]
    fn test_next_cycle_without_rate_shows_stale_estimate() {
        let mut last = Some(4200.0);
        let projection =
            time_to_next_cycle(&mut last, PowerSource::Battery, Some(1000), None, None, None);
        assert_eq!(projection, Projection::Calculating { seconds: 4200.0 });

        let mut no_history = None;
        let projection =
            time_to_next_cycle(&mut no_history, PowerSource::Battery, Some(1000), None, None, None);
        assert_eq!(projection, Projection::Unavailable);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0m");
        assert_eq!(format_duration(59.0), "1m");
        assert_eq!(format_duration(3600.0), "1h 0m");
        assert_eq!(format_duration(12_300.0), "3h 25m");
        assert_eq!(format_duration(-5.0), "0m");
    }
}
