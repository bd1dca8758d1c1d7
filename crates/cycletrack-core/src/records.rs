//! Daily accounting records and the durable record store.
//!
//! One [`DailyRecord`] per local calendar day, each owning an ordered list of
//! [`CycleBreakdown`] segments. The JSON-backed store writes atomically
//! (temp file then rename) so a crash mid-write cannot corrupt history.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A segment of discharged charge attributed to a (possibly partial) cycle.
///
/// Created when accumulated charge hits a cycle or day boundary; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleBreakdown {
    /// 1-based, strictly increasing per owning record.
    pub index: i64,
    /// Charge consumed by this segment, in mAh.
    pub mah_used: f64,
    /// True when the segment was split across a day boundary.
    pub is_partial: bool,
    /// Progress toward a full cycle, 0-100.
    pub completion_percent: f64,
}

/// One day's accounting row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    /// Local calendar day this record covers. Unique per store.
    pub day: NaiveDate,
    /// Lifetime cycles gained this day.
    #[serde(default)]
    pub cycles: i64,
    /// Fractional cycle progress: total_mah_used / design capacity.
    #[serde(default)]
    pub raw_cycles: f64,
    /// Charge moved while discharging this day, in mAh.
    #[serde(default)]
    pub total_mah_used: f64,
    /// Seconds spent on battery.
    #[serde(default)]
    pub time_on_battery: f64,
    /// Seconds spent on external power.
    #[serde(default)]
    pub time_plugged_in: f64,
    #[serde(default)]
    pub breakdowns: Vec<CycleBreakdown>,
}

impl DailyRecord {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            cycles: 0,
            raw_cycles: 0.0,
            total_mah_used: 0.0,
            time_on_battery: 0.0,
            time_plugged_in: 0.0,
            breakdowns: Vec::new(),
        }
    }

    /// Next free breakdown index for this record.
    pub fn next_breakdown_index(&self) -> i64 {
        self.breakdowns.iter().map(|b| b.index).max().unwrap_or(0) + 1
    }
}

/// Durable, date-keyed table of daily records.
///
/// A plain day -> record map: callers read-modify-write whole records via
/// [`get`](Self::get) and [`put`](Self::put).
pub trait RecordStore {
    fn get(&self, day: NaiveDate) -> Option<DailyRecord>;

    /// Insert or replace the record for its day.
    fn put(&mut self, record: DailyRecord) -> Result<(), StoreError>;

    /// All records in ascending date order.
    fn all(&self) -> Vec<DailyRecord>;

    fn delete_all(&mut self) -> Result<(), StoreError>;

    /// On-disk location, when the store has one.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: BTreeMap<NaiveDate, DailyRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, day: NaiveDate) -> Option<DailyRecord> {
        self.records.get(&day).cloned()
    }

    fn put(&mut self, record: DailyRecord) -> Result<(), StoreError> {
        self.records.insert(record.day, record);
        Ok(())
    }

    fn all(&self) -> Vec<DailyRecord> {
        self.records.values().cloned().collect()
    }

    fn delete_all(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        Ok(())
    }
}

/// File-backed store holding the whole table as one JSON document.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    records: BTreeMap<NaiveDate, DailyRecord>,
}

impl JsonRecordStore {
    /// Open (or create) the store at `path`, loading any existing records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let loaded: Vec<DailyRecord> = serde_json::from_str(&content)?;
            loaded.into_iter().map(|r| (r.day, r)).collect()
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, records })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let ordered: Vec<&DailyRecord> = self.records.values().collect();
        let json = serde_json::to_string_pretty(&ordered)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    fn get(&self, day: NaiveDate) -> Option<DailyRecord> {
        self.records.get(&day).cloned()
    }

    fn put(&mut self, record: DailyRecord) -> Result<(), StoreError> {
        self.records.insert(record.day, record);
        self.persist()
    }

    fn all(&self) -> Vec<DailyRecord> {
        self.records.values().cloned().collect()
    }

    fn delete_all(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        self.persist()
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Write via a temp file and rename so readers never observe a partial file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    let _ = fs::remove_file(&temp_path);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn sample_record(d: &str) -> DailyRecord {
        let mut record = DailyRecord::new(day(d));
        record.cycles = 2;
        record.raw_cycles = 0.5;
        record.total_mah_used = 2100.0;
        record.time_on_battery = 3600.0;
        record.time_plugged_in = 1800.0;
        record.breakdowns.push(CycleBreakdown {
            index: 1,
            mah_used: 2100.0,
            is_partial: false,
            completion_percent: 50.0,
        });
        record
    }

    #[test]
    fn test_memory_store_put_replaces() {
        let mut store = MemoryRecordStore::new();
        store.put(sample_record("2026-02-17")).unwrap();
        let mut updated = sample_record("2026-02-17");
        updated.cycles = 3;
        store.put(updated).unwrap();

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.get(day("2026-02-17")).unwrap().cycles, 3);
    }

    #[test]
    fn test_all_is_date_ordered() {
        let mut store = MemoryRecordStore::new();
        store.put(sample_record("2026-02-19")).unwrap();
        store.put(sample_record("2026-02-17")).unwrap();
        store.put(sample_record("2026-02-18")).unwrap();

        let days: Vec<NaiveDate> = store.all().iter().map(|r| r.day).collect();
        assert_eq!(
            days,
            vec![day("2026-02-17"), day("2026-02-18"), day("2026-02-19")]
        );
    }

    #[test]
    fn test_next_breakdown_index() {
        let mut record = DailyRecord::new(day("2026-02-17"));
        assert_eq!(record.next_breakdown_index(), 1);
        record.breakdowns.push(CycleBreakdown {
            index: 4,
            mah_used: 10.0,
            is_partial: false,
            completion_percent: 1.0,
        });
        assert_eq!(record.next_breakdown_index(), 5);
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        {
            let mut store = JsonRecordStore::open(&path).unwrap();
            store.put(sample_record("2026-02-17")).unwrap();
            store.put(sample_record("2026-02-18")).unwrap();
        }

        let reopened = JsonRecordStore::open(&path).unwrap();
        assert_eq!(reopened.all().len(), 2);
        assert_eq!(reopened.get(day("2026-02-17")), Some(sample_record("2026-02-17")));
        assert_eq!(reopened.location(), Some(path.as_path()));
    }

    #[test]
    fn test_json_store_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let mut store = JsonRecordStore::open(&path).unwrap();
        store.put(sample_record("2026-02-17")).unwrap();
        store.delete_all().unwrap();
        assert!(store.all().is_empty());

        let reopened = JsonRecordStore::open(&path).unwrap();
        assert!(reopened.all().is_empty());
    }

    #[test]
    fn test_json_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/records.json");
        let mut store = JsonRecordStore::open(&path).unwrap();
        store.put(sample_record("2026-02-17")).unwrap();
        assert!(path.exists());
    }
}
