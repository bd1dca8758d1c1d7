//! Cycle baseline tracking.
//!
//! Derives "cycles gained today" from the lifetime cycle counter by anchoring
//! a baseline at the first sample of each local day: today's cycles are the
//! counter minus the baseline, floored at zero.

use chrono::NaiveDate;

use super::{fetch_or_new, store_record};
use crate::records::RecordStore;
use crate::scalars::ScalarState;

/// Update the baseline and return today's cycle count.
///
/// `None` only when the lifetime counter itself is unavailable; the baseline
/// and record are left untouched in that case.
pub(super) fn update_cycles_today(
    state: &mut ScalarState,
    records: &mut dyn RecordStore,
    today: NaiveDate,
    cycle_count: Option<i64>,
) -> Option<i64> {
    let count = cycle_count?;
    let mut record = fetch_or_new(records, today);
    let existing_cycles = record.cycles;

    if state.baseline_day != Some(today) {
        // First sample of the day. Anchor so the already-recorded cycles
        // (from a previous run today) are preserved, not double counted.
        state.baseline_count = Some((count - existing_cycles).max(0));
        state.baseline_day = Some(today);
        record.cycles = existing_cycles;
        store_record(records, record);
        return Some(existing_cycles);
    }

    let mut baseline = state.baseline_count.unwrap_or(count);
    // Self-heal a zeroed baseline: a record already carrying cycles with a
    // zero baseline means the anchor was lost, not that the counter started
    // at zero.
    if state.baseline_count == Some(0) && existing_cycles > 0 && existing_cycles < count {
        baseline = count - existing_cycles;
        state.baseline_count = Some(baseline);
    }

    let today_cycles = (count - baseline).max(0);
    record.cycles = today_cycles;
    store_record(records, record);
    Some(today_cycles)
}
