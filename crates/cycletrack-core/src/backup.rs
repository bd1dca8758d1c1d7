//! CSV backup codec.
//!
//! Exports the daily-record table and its breakdowns as two comma-separated
//! tables linked by a synthetic integer key, and restores them with
//! best-effort re-linking when the foreign-key column is renamed or missing.
//! Restore is a full replace, staged in memory and validated before any
//! store mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::records::{CycleBreakdown, DailyRecord, RecordStore, StoreError};

/// Seconds between the Unix epoch and the interchange format's reference
/// epoch (2001-01-01T00:00:00Z).
const REFERENCE_EPOCH_UNIX: i64 = 978_307_200;

const DAILY_TABLE: &str = "ZDAILYCYCLE.csv";
const BREAKDOWN_TABLE: &str = "ZCYCLEBREAKDOWN.csv";

const DAILY_HEADER: &str =
    "Z_PK,Z_ENT,Z_OPT,ZCYCLES,ZDATE,ZRAWCYCLES,ZTIMEONBATTERY,ZTIMEPLUGGEDIN,ZTOTALMAHUSED";
const BREAKDOWN_HEADER: &str =
    "Z_PK,Z_ENT,Z_OPT,ZINDEX,ZISPARTIAL,Z2CYCLEBREAKDOWNS,ZCOMPLETIONPERCENT,ZMAHUSED,ZID";

/// Foreign-key column names accepted when linking breakdowns to daily rows.
const FK_COLUMN_CANDIDATES: [&str; 6] = [
    "Z2CYCLEBREAKDOWNS",
    "ZDAILYCYCLE",
    "Z1DAILYCYCLE",
    "ZDAILYCYCLEID",
    "ZDAILYCYCLES",
    "Z2DAILYCYCLES",
];

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup file is empty: {0}")]
    EmptyFile(String),
    #[error("no file matching ZDAILYCYCLE.csv was selected")]
    MissingDailyTable,
    #[error("{file} is missing required column(s): {}", .columns.join(", "))]
    MissingColumns { file: String, columns: Vec<String> },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Row counts from a completed restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted_daily: usize,
    pub skipped_daily: usize,
    pub inserted_breakdowns: usize,
    pub skipped_breakdowns: usize,
}

/// Write both tables into `dir` and return their paths.
pub fn export_backup(
    records: &[DailyRecord],
    dir: &Path,
    clock: &dyn Clock,
) -> Result<(PathBuf, PathBuf), BackupError> {
    let mut ordered: Vec<&DailyRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.day);

    let mut daily = String::from(DAILY_HEADER);
    daily.push('\n');
    let mut breakdowns = String::from(BREAKDOWN_HEADER);
    breakdowns.push('\n');

    let mut breakdown_pk = 0i64;
    for (i, record) in ordered.iter().enumerate() {
        let daily_pk = i as i64 + 1;
        let date_seconds = clock.start_of_day(record.day).timestamp() - REFERENCE_EPOCH_UNIX;
        daily.push_str(&format!(
            "{},2,1,{},{},{:.12},{:.6},{:.6},{:.6}\n",
            daily_pk,
            record.cycles,
            date_seconds,
            record.raw_cycles,
            record.time_on_battery,
            record.time_plugged_in,
            record.total_mah_used,
        ));
        for segment in &record.breakdowns {
            breakdown_pk += 1;
            breakdowns.push_str(&format!(
                "{},16002,1,{},{},{},{:.6},{:.6},\n",
                breakdown_pk,
                segment.index,
                segment.is_partial as i64,
                daily_pk,
                segment.completion_percent,
                segment.mah_used,
            ));
        }
    }

    let daily_path = dir.join(DAILY_TABLE);
    let breakdown_path = dir.join(BREAKDOWN_TABLE);
    write_file(&daily_path, &daily)?;
    write_file(&breakdown_path, &breakdowns)?;
    info!(
        records = ordered.len(),
        breakdowns = breakdown_pk,
        "exported backup to {}",
        dir.display()
    );
    Ok((daily_path, breakdown_path))
}

/// Restore from a user-selected set of files, replacing all existing records.
///
/// Files are matched by case-insensitive substring of their file name; the
/// daily table is mandatory, the breakdown table optional. Everything is
/// staged and validated before the store is touched.
pub fn restore_backup(
    paths: &[PathBuf],
    records: &mut dyn RecordStore,
    clock: &dyn Clock,
) -> Result<ImportReport, BackupError> {
    let daily_path = find_table(paths, "zdailycycle").ok_or(BackupError::MissingDailyTable)?;
    let breakdown_path = find_table(paths, "zcyclebreakdown");

    let mut report = ImportReport::default();
    let (mut staged, pk_index) = parse_daily_table(daily_path, clock, &mut report)?;
    if let Some(path) = breakdown_path {
        parse_breakdown_table(path, &mut staged, &pk_index, &mut report)?;
    }

    // Validation passed for both tables; only now touch the store.
    records.delete_all()?;
    for record in staged {
        records.put(record)?;
    }
    info!(
        inserted_daily = report.inserted_daily,
        inserted_breakdowns = report.inserted_breakdowns,
        skipped_daily = report.skipped_daily,
        skipped_breakdowns = report.skipped_breakdowns,
        "restored backup"
    );
    Ok(report)
}

fn find_table<'a>(paths: &'a [PathBuf], needle: &str) -> Option<&'a Path> {
    paths.iter().map(PathBuf::as_path).find(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), BackupError> {
    std::fs::write(path, content).map_err(|source| BackupError::Write {
        path: path.to_path_buf(),
        source,
    })
}

struct Table {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    fn field<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column(name).and_then(|i| row.get(i)).map(String::as_str)
    }
}

fn read_table(path: &Path, table_name: &str) -> Result<Table, BackupError> {
    let content = std::fs::read_to_string(path).map_err(|source| BackupError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| BackupError::EmptyFile(table_name.to_string()))?;

    let columns = header
        .split(',')
        .enumerate()
        .map(|(i, name)| (name.trim().to_ascii_uppercase(), i))
        .collect();
    let rows = lines
        .map(|line| line.split(',').map(|f| f.trim().to_string()).collect())
        .collect();
    Ok(Table { columns, rows })
}

fn require_columns(table: &Table, file: &str, required: &[&str]) -> Result<(), BackupError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| table.column(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BackupError::MissingColumns {
            file: file.to_string(),
            columns: missing,
        })
    }
}

/// Parse the daily table into records plus a synthetic-key -> index map.
fn parse_daily_table(
    path: &Path,
    clock: &dyn Clock,
    report: &mut ImportReport,
) -> Result<(Vec<DailyRecord>, HashMap<i64, usize>), BackupError> {
    let table = read_table(path, DAILY_TABLE)?;
    require_columns(&table, DAILY_TABLE, &["Z_PK", "ZDATE"])?;

    let mut staged: Vec<DailyRecord> = Vec::new();
    let mut pk_day: HashMap<i64, chrono::NaiveDate> = HashMap::new();
    for row in &table.rows {
        let pk = table.field(row, "Z_PK").and_then(parse_i64);
        let date_seconds = table.field(row, "ZDATE").and_then(parse_f64);
        let (Some(pk), Some(date_seconds)) = (pk, date_seconds) else {
            report.skipped_daily += 1;
            debug!("skipping daily row without a parseable key/date");
            continue;
        };
        let Some(instant) =
            DateTime::<Utc>::from_timestamp(REFERENCE_EPOCH_UNIX + date_seconds as i64, 0)
        else {
            report.skipped_daily += 1;
            continue;
        };

        let mut record = DailyRecord::new(clock.day_of(instant));
        record.cycles = table.field(row, "ZCYCLES").and_then(parse_i64).unwrap_or(0);
        record.raw_cycles = table
            .field(row, "ZRAWCYCLES")
            .and_then(parse_f64)
            .unwrap_or(0.0);
        record.time_on_battery = table
            .field(row, "ZTIMEONBATTERY")
            .and_then(parse_f64)
            .unwrap_or(0.0);
        record.time_plugged_in = table
            .field(row, "ZTIMEPLUGGEDIN")
            .and_then(parse_f64)
            .unwrap_or(0.0);
        record.total_mah_used = table
            .field(row, "ZTOTALMAHUSED")
            .and_then(parse_f64)
            .unwrap_or(0.0);

        pk_day.insert(pk, record.day);
        staged.push(record);
        report.inserted_daily += 1;
    }

    staged.sort_by_key(|r| r.day);
    // Keys must point into the final date order, not row order.
    let day_to_index: HashMap<_, _> = staged
        .iter()
        .enumerate()
        .map(|(i, r)| (r.day, i))
        .collect();
    let pk_index = pk_day
        .into_iter()
        .filter_map(|(pk, day)| day_to_index.get(&day).map(|i| (pk, *i)))
        .collect();
    Ok((staged, pk_index))
}

fn parse_breakdown_table(
    path: &Path,
    staged: &mut [DailyRecord],
    pk_index: &HashMap<i64, usize>,
    report: &mut ImportReport,
) -> Result<(), BackupError> {
    let table = read_table(path, BREAKDOWN_TABLE)?;
    require_columns(&table, BREAKDOWN_TABLE, &["ZMAHUSED", "ZCOMPLETIONPERCENT"])?;

    let fk_column = FK_COLUMN_CANDIDATES
        .iter()
        .find(|name| table.column(name).is_some())
        .copied();

    let mut unlinked: Vec<CycleBreakdown> = Vec::new();
    for row in &table.rows {
        let mah_used = table.field(row, "ZMAHUSED").and_then(parse_f64);
        let completion = table.field(row, "ZCOMPLETIONPERCENT").and_then(parse_f64);
        let (Some(mah_used), Some(completion_percent)) = (mah_used, completion) else {
            report.skipped_breakdowns += 1;
            continue;
        };
        let segment = CycleBreakdown {
            index: table.field(row, "ZINDEX").and_then(parse_i64).unwrap_or(0),
            mah_used,
            is_partial: table
                .field(row, "ZISPARTIAL")
                .and_then(parse_i64)
                .unwrap_or(0)
                != 0,
            completion_percent,
        };

        let owner = fk_column
            .and_then(|name| table.field(row, name))
            .and_then(parse_i64)
            .and_then(|pk| pk_index.get(&pk).copied());
        match owner {
            Some(index) => {
                attach(&mut staged[index], segment);
                report.inserted_breakdowns += 1;
            }
            None => unlinked.push(segment),
        }
    }

    // Unlinked rows only count as inserted once a record actually took them.
    let pooled = unlinked.len();
    let placed = allocate_unlinked(staged, unlinked);
    report.inserted_breakdowns += placed;
    report.skipped_breakdowns += pooled - placed;
    Ok(())
}

fn attach(record: &mut DailyRecord, mut segment: CycleBreakdown) {
    if segment.index <= 0 {
        segment.index = record.next_breakdown_index();
    }
    record.breakdowns.push(segment);
}

/// Distribute breakdowns whose foreign key did not resolve, returning how
/// many rows found a home.
///
/// Records with positive cycle counts absorb rows proportionally to those
/// counts in date order; otherwise rows are split as evenly as possible.
/// Leftovers go to the latest-dated record. With no records at all, nothing
/// can be placed and the rows stay unallocated.
fn allocate_unlinked(staged: &mut [DailyRecord], unlinked: Vec<CycleBreakdown>) -> usize {
    if unlinked.is_empty() || staged.is_empty() {
        return 0;
    }
    let total = unlinked.len();
    let mut remaining = unlinked.into_iter();
    let total_cycles: i64 = staged.iter().map(|r| r.cycles.max(0)).sum();

    if total_cycles > 0 {
        for record in staged.iter_mut() {
            for _ in 0..record.cycles.max(0) {
                match remaining.next() {
                    Some(segment) => attach(record, segment),
                    None => return total,
                }
            }
        }
    } else {
        let rows = remaining.len();
        let per = rows / staged.len();
        let extra = rows % staged.len();
        for (i, record) in staged.iter_mut().enumerate() {
            let take = per + usize::from(i < extra);
            for _ in 0..take {
                match remaining.next() {
                    Some(segment) => attach(record, segment),
                    None => return total,
                }
            }
        }
    }

    // Anything a proportional pass could not place lands on the latest day.
    if let Some(last) = staged.last_mut() {
        for segment in remaining {
            attach(last, segment);
        }
    }
    total
}

fn parse_i64(field: &str) -> Option<i64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field
        .parse::<i64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().map(|f| f as i64))
}

fn parse_f64(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok()
}
