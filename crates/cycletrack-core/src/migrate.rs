//! One-shot import of the legacy flat day -> cycles map.
//!
//! Older versions persisted only a per-day cycle count. The import runs once
//! (guarded by a scalar flag) and only fills days the record store does not
//! already account for.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::records::{DailyRecord, RecordStore, StoreError};
use crate::scalars::ScalarState;

/// Import legacy daily cycle counts, returning how many days were filled.
pub fn import_legacy_daily_cycles(
    legacy: &BTreeMap<NaiveDate, i64>,
    records: &mut dyn RecordStore,
    state: &mut ScalarState,
) -> Result<usize, StoreError> {
    if state.legacy_cycles_imported {
        return Ok(0);
    }

    let mut imported = 0;
    for (&day, &cycles) in legacy {
        if cycles <= 0 {
            continue;
        }
        let mut record = records
            .get(day)
            .unwrap_or_else(|| DailyRecord::new(day));
        // A record that already carries cycles wins over the legacy map.
        if record.cycles > 0 {
            continue;
        }
        record.cycles = cycles;
        records.put(record)?;
        imported += 1;
    }

    state.legacy_cycles_imported = true;
    if imported > 0 {
        info!(days = imported, "imported legacy daily cycle counts");
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryRecordStore;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn legacy(entries: &[(&str, i64)]) -> BTreeMap<NaiveDate, i64> {
        entries.iter().map(|(d, c)| (day(d), *c)).collect()
    }

    #[test]
    fn test_import_fills_missing_days() {
        let mut records = MemoryRecordStore::new();
        let mut state = ScalarState::default();
        let map = legacy(&[("2025-11-01", 2), ("2025-11-02", 0), ("2025-11-03", 1)]);

        let imported = import_legacy_daily_cycles(&map, &mut records, &mut state).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(records.get(day("2025-11-01")).unwrap().cycles, 2);
        assert_eq!(records.get(day("2025-11-02")), None);
        assert!(state.legacy_cycles_imported);
    }

    #[test]
    fn test_existing_records_win() {
        let mut records = MemoryRecordStore::new();
        let mut existing = DailyRecord::new(day("2025-11-01"));
        existing.cycles = 5;
        records.put(existing).unwrap();

        let mut state = ScalarState::default();
        let imported = import_legacy_daily_cycles(
            &legacy(&[("2025-11-01", 2)]),
            &mut records,
            &mut state,
        )
        .unwrap();
        assert_eq!(imported, 0);
        assert_eq!(records.get(day("2025-11-01")).unwrap().cycles, 5);
    }

    #[test]
    fn test_import_runs_once() {
        let mut records = MemoryRecordStore::new();
        let mut state = ScalarState::default();
        let map = legacy(&[("2025-11-01", 2)]);

        import_legacy_daily_cycles(&map, &mut records, &mut state).unwrap();
        records.delete_all().unwrap();
        let imported = import_legacy_daily_cycles(&map, &mut records, &mut state).unwrap();
        assert_eq!(imported, 0);
        assert_eq!(records.all(), vec![]);
    }
}
