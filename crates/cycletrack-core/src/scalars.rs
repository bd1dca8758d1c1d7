//! Scalar bookkeeping state.
//!
//! Everything the engine must remember between ticks and across restarts
//! lives in one explicit [`ScalarState`] value, injected into the engine and
//! persisted through a [`ScalarStore`]. Fields are created lazily (all
//! defaults mean "never seen a sample") and overwritten on every relevant
//! tick; nothing is ever explicitly deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{write_atomic, StoreError};
use crate::telemetry::PowerSource;

/// Persisted scalar bookkeeping for one engine instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarState {
    /// Day the cycle baseline was anchored on.
    #[serde(default)]
    pub baseline_day: Option<NaiveDate>,
    /// Lifetime counter value subtracted to derive "cycles gained today".
    #[serde(default)]
    pub baseline_count: Option<i64>,

    /// Last capacity sample seen by the discharge estimator.
    #[serde(default)]
    pub cycle_last_capacity_mah: Option<i64>,
    /// Last capacity sample seen by the daily usage accumulator.
    ///
    /// Kept separate from the cycle estimator's sample because the two
    /// reset independently (cycle boundary vs. day boundary).
    #[serde(default)]
    pub usage_last_capacity_mah: Option<i64>,

    /// Last observed lifetime cycle counter.
    #[serde(default)]
    pub last_cycle_count: Option<i64>,
    /// Charge discharged since the counter last incremented, in mAh.
    #[serde(default)]
    pub discharged_since_last_cycle_mah: f64,

    /// Day the in-progress cycle scratch belongs to.
    #[serde(default)]
    pub cycle_day: Option<NaiveDate>,
    /// Charge attributed to the in-progress cycle on that day, in mAh.
    #[serde(default)]
    pub cycle_day_mah_used: f64,
    /// True when the in-progress cycle carried over a day boundary.
    #[serde(default)]
    pub cycle_started_previous_day: bool,

    /// Day of the last usage sample.
    #[serde(default)]
    pub last_sample_day: Option<NaiveDate>,
    /// Instant of the last usage sample.
    #[serde(default)]
    pub last_sample_at: Option<DateTime<Utc>>,
    /// Power source observed at the last usage sample.
    #[serde(default)]
    pub last_power_source: PowerSource,
    /// Today's cumulative discharged charge, in mAh.
    #[serde(default)]
    pub today_mah_used: f64,

    /// Cached "official" health percentage and when it was fetched.
    #[serde(default)]
    pub official_health_percent: Option<i64>,
    #[serde(default)]
    pub official_health_fetched_at: Option<DateTime<Utc>>,

    /// Set once the legacy flat day->cycles map has been imported.
    #[serde(default)]
    pub legacy_cycles_imported: bool,
}

/// Durable home for [`ScalarState`].
pub trait ScalarStore {
    fn load(&self) -> Result<ScalarState, StoreError>;
    fn save(&mut self, state: &ScalarState) -> Result<(), StoreError>;
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryScalarStore {
    state: ScalarState,
}

impl MemoryScalarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved state, for assertions.
    pub fn state(&self) -> &ScalarState {
        &self.state
    }
}

impl ScalarStore for MemoryScalarStore {
    fn load(&self) -> Result<ScalarState, StoreError> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &ScalarState) -> Result<(), StoreError> {
        self.state = state.clone();
        Ok(())
    }
}

/// File-backed store, one JSON document, atomic writes.
#[derive(Debug)]
pub struct JsonScalarStore {
    path: std::path::PathBuf,
}

impl JsonScalarStore {
    pub fn open(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScalarStore for JsonScalarStore {
    fn load(&self) -> Result<ScalarState, StoreError> {
        if !self.path.exists() {
            return Ok(ScalarState::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&mut self, state: &ScalarState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}
