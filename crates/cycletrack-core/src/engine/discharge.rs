//! Discharge-to-next-cycle estimation.
//!
//! Accumulates capacity drops between samples into a running total since the
//! last lifetime-counter increment, and turns that total into "mAh until the
//! next cycle" against the design capacity. Also maintains the per-day cycle
//! scratch that feeds partial/complete breakdown segments.

use chrono::NaiveDate;

use super::{fetch_or_new, store_record};
use crate::records::{CycleBreakdown, RecordStore};
use crate::scalars::ScalarState;

/// Advance the discharge estimator one sample and return the estimated mAh
/// remaining until the next cycle increment.
///
/// `None` when the current capacity or a positive design capacity is
/// unavailable this tick.
pub(super) fn update_mah_to_next_cycle(
    state: &mut ScalarState,
    records: &mut dyn RecordStore,
    today: NaiveDate,
    cycle_count: Option<i64>,
    current_capacity: Option<i64>,
    design_capacity: Option<i64>,
) -> Option<i64> {
    let current = current_capacity?;
    let design = design_capacity.filter(|d| *d > 0)?;

    roll_day(state, records, today, design);

    let incremented = matches!(
        (cycle_count, state.last_cycle_count),
        (Some(count), Some(last)) if count > last
    );

    if incremented {
        if state.cycle_day_mah_used > 0.0 {
            emit_breakdown(
                records,
                today,
                state.cycle_day_mah_used,
                state.cycle_started_previous_day,
                design,
            );
        }
        state.discharged_since_last_cycle_mah = 0.0;
        state.cycle_day_mah_used = 0.0;
        state.cycle_started_previous_day = false;
    } else if let Some(last) = state.cycle_last_capacity_mah {
        if current < last {
            let delta = (last - current) as f64;
            state.discharged_since_last_cycle_mah += delta;
            state.cycle_day_mah_used += delta;
        }
    }

    state.cycle_last_capacity_mah = Some(current);
    if cycle_count.is_some() {
        state.last_cycle_count = cycle_count;
    }

    let remaining = (design as f64 - state.discharged_since_last_cycle_mah).max(0.0);
    Some(remaining.ceil() as i64)
}

/// Close out yesterday's in-progress cycle scratch when the day changes.
fn roll_day(state: &mut ScalarState, records: &mut dyn RecordStore, today: NaiveDate, design: i64) {
    match state.cycle_day {
        Some(day) if day == today => return,
        Some(day) => {
            if state.cycle_day_mah_used > 0.0 {
                // The cycle spans midnight: record what yesterday contributed
                // as a partial segment and keep accumulating on the new day.
                emit_breakdown(records, day, state.cycle_day_mah_used, true, design);
                state.cycle_started_previous_day = true;
            }
        }
        None => {}
    }
    state.cycle_day = Some(today);
    state.cycle_day_mah_used = 0.0;
}

fn emit_breakdown(
    records: &mut dyn RecordStore,
    day: NaiveDate,
    mah_used: f64,
    is_partial: bool,
    design: i64,
) {
    let mut record = fetch_or_new(records, day);
    let completion = (mah_used / design as f64 * 100.0).clamp(0.0, 100.0);
    record.breakdowns.push(CycleBreakdown {
        index: record.next_breakdown_index(),
        mah_used,
        is_partial,
        completion_percent: completion,
    });
    store_record(records, record);
}
