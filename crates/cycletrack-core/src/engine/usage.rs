//! Daily usage accumulation.
//!
//! Integrates elapsed time between samples into the day's on-battery /
//! plugged-in totals and adds capacity drops to the day's discharged charge.
//! Time is attributed to the power source in effect during the interval,
//! i.e. the source observed at the previous sample.

use chrono::{DateTime, NaiveDate, Utc};

use super::{fetch_or_new, store_record};
use crate::records::RecordStore;
use crate::scalars::ScalarState;
use crate::telemetry::PowerSource;

/// Fold one sample into today's usage totals and return the day's cumulative
/// discharged charge in mAh.
///
/// `None` when the interval's power source cannot be determined; the sample
/// state still advances so the next interval is attributed correctly.
pub(super) fn update_daily_stats(
    state: &mut ScalarState,
    records: &mut dyn RecordStore,
    today: NaiveDate,
    now: DateTime<Utc>,
    power_source: PowerSource,
    current_capacity: Option<i64>,
    design_capacity: Option<i64>,
) -> Option<f64> {
    // First sample of the day (or ever): nothing elapsed yet, just seed.
    if state.last_sample_day != Some(today) || state.last_sample_at.is_none() {
        state.today_mah_used = 0.0;
        advance_sample(state, today, now, power_source, current_capacity);
        return Some(0.0);
    }

    let last_at = state.last_sample_at?;
    let elapsed_seconds = (now - last_at).num_milliseconds().max(0) as f64 / 1000.0;

    // The interval ran under the source seen at its start; fall back to the
    // current reading when that start reading was unknown.
    let effective = match state.last_power_source {
        PowerSource::Unknown => power_source,
        source => source,
    };
    if effective == PowerSource::Unknown {
        advance_sample(state, today, now, power_source, current_capacity);
        return None;
    }

    let mut record = fetch_or_new(records, today);

    // Warm-start after a restart: the record remembers what the lost scalar
    // state does not.
    if state.today_mah_used == 0.0 && record.total_mah_used > 0.0 {
        state.today_mah_used = record.total_mah_used;
    }

    if let (Some(current), Some(last)) = (current_capacity, state.usage_last_capacity_mah) {
        if current < last {
            state.today_mah_used += (last - current) as f64;
        }
    }

    record.total_mah_used = state.today_mah_used;
    record.raw_cycles = match design_capacity {
        Some(design) if design > 0 => state.today_mah_used / design as f64,
        _ => 0.0,
    };
    match effective {
        PowerSource::Battery => record.time_on_battery += elapsed_seconds,
        PowerSource::External => record.time_plugged_in += elapsed_seconds,
        PowerSource::Unknown => {}
    }
    store_record(records, record);

    advance_sample(state, today, now, power_source, current_capacity);
    Some(state.today_mah_used)
}

fn advance_sample(
    state: &mut ScalarState,
    today: NaiveDate,
    now: DateTime<Utc>,
    power_source: PowerSource,
    current_capacity: Option<i64>,
) {
    state.last_sample_day = Some(today);
    state.last_sample_at = Some(now);
    state.last_power_source = power_source;
    if current_capacity.is_some() {
        state.usage_last_capacity_mah = current_capacity;
    }
}
