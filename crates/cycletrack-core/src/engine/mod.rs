//! The accounting engine.
//!
//! One [`Engine::tick`] per poll: reads samples from the telemetry source,
//! updates both stores, and returns a [`Snapshot`] of derived display values.
//! Store write failures are logged and the tick continues with in-memory
//! values; the next tick retries.

mod baseline;
mod discharge;
mod projection;
mod usage;

pub use projection::{format_duration, Projection, TimeEstimate};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::warn;

use crate::clock::Clock;
use crate::records::{DailyRecord, RecordStore};
use crate::scalars::{ScalarState, ScalarStore};
use crate::telemetry::{PowerSource, TelemetrySource};

/// Minimum age before the official health percentage is fetched again.
const OFFICIAL_HEALTH_TTL_MINUTES: i64 = 10;

/// Engine tuning: the fixed cycle target and the low-charge threshold.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lifetime cycle count to reach by the deadline.
    pub target_total_cycles: i64,
    /// Deadline for the cycle target.
    pub target_deadline: NaiveDate,
    /// Low-charge threshold as a percentage of maximum capacity.
    pub low_charge_percent: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_total_cycles: 1000,
            target_deadline: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            low_charge_percent: 10.0,
        }
    }
}

/// Derived display values republished on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub day: NaiveDate,
    pub power_source: PowerSource,
    pub cycle_count: Option<i64>,
    pub health_text: Option<String>,
    pub official_health_percent: Option<i64>,
    pub current_capacity_mah: Option<i64>,
    pub max_capacity_mah: Option<i64>,
    pub design_capacity_mah: Option<i64>,
    pub cycles_today: Option<i64>,
    pub cycles_per_day_needed: Option<f64>,
    pub mah_to_next_cycle: Option<i64>,
    pub total_mah_used_today: Option<f64>,
    pub time_remaining: TimeEstimate,
    /// Seconds until charge drops to the low-charge threshold, while discharging.
    pub seconds_to_low_charge: Option<f64>,
    pub time_to_next_cycle: Projection,
}

impl Snapshot {
    /// True when at least one telemetry-backed field was readable this tick.
    pub fn has_telemetry(&self) -> bool {
        self.cycle_count.is_some()
            || self.current_capacity_mah.is_some()
            || self.power_source != PowerSource::Unknown
    }
}

/// Stateful accounting engine; one instance per tracked battery.
///
/// Owns the persisted [`ScalarState`] plus a single in-memory cache (the last
/// good time-to-next-cycle estimate) whose loss only degrades display text.
pub struct Engine {
    config: EngineConfig,
    state: ScalarState,
    last_next_cycle_seconds: Option<f64>,
}

impl Engine {
    pub fn new(config: EngineConfig, state: ScalarState) -> Self {
        Self {
            config,
            state,
            last_next_cycle_seconds: None,
        }
    }

    pub fn state(&self) -> &ScalarState {
        &self.state
    }

    /// Run one accounting tick.
    pub fn tick(
        &mut self,
        clock: &dyn Clock,
        telemetry: &dyn TelemetrySource,
        records: &mut dyn RecordStore,
        scalars: &mut dyn ScalarStore,
    ) -> Snapshot {
        let now = clock.now();
        let today = clock.day_of(now);

        let power_source = telemetry.power_source();
        let cycle_count = telemetry.cycle_count();
        let capacity = telemetry.capacity();
        let design_capacity = telemetry.design_capacity();
        let health_text = telemetry.health_text();
        let current_capacity = capacity.map(|c| c.current_mah);

        let cycles_today = baseline::update_cycles_today(&mut self.state, records, today, cycle_count);
        let cycles_per_day_needed =
            projection::cycles_per_day_needed(&self.config, today, cycle_count);
        let mah_to_next_cycle = discharge::update_mah_to_next_cycle(
            &mut self.state,
            records,
            today,
            cycle_count,
            current_capacity,
            design_capacity,
        );

        let time_sample = telemetry.time_remaining();
        let time_remaining = projection::time_to_full_or_empty(time_sample);
        let seconds_to_low_charge =
            projection::seconds_to_low_charge(&self.config, time_sample, capacity);
        let today_record = records.get(today);
        let time_to_next_cycle = projection::time_to_next_cycle(
            &mut self.last_next_cycle_seconds,
            power_source,
            mah_to_next_cycle,
            today_record.as_ref(),
            time_sample,
            current_capacity,
        );

        let total_mah_used_today = usage::update_daily_stats(
            &mut self.state,
            records,
            today,
            now,
            power_source,
            current_capacity,
            design_capacity,
        );

        self.refresh_official_health(now, telemetry);

        if let Err(err) = scalars.save(&self.state) {
            warn!("failed to persist scalar state: {err}");
        }

        Snapshot {
            day: today,
            power_source,
            cycle_count,
            health_text,
            official_health_percent: self.state.official_health_percent,
            current_capacity_mah: current_capacity,
            max_capacity_mah: capacity.map(|c| c.max_mah),
            design_capacity_mah: design_capacity,
            cycles_today,
            cycles_per_day_needed,
            mah_to_next_cycle,
            total_mah_used_today,
            time_remaining,
            seconds_to_low_charge,
            time_to_next_cycle,
        }
    }

    /// Manually bump today's cycle count by one and re-anchor the baseline
    /// so the next tick re-derives the same value.
    pub fn increment_today_cycle(
        &mut self,
        clock: &dyn Clock,
        telemetry: &dyn TelemetrySource,
        records: &mut dyn RecordStore,
        scalars: &mut dyn ScalarStore,
    ) -> i64 {
        let today = clock.today();
        let mut record = fetch_or_new(records, today);
        record.cycles += 1;
        let new_cycles = record.cycles;
        store_record(records, record);

        if let Some(count) = telemetry.cycle_count() {
            self.state.baseline_count = Some((count - new_cycles).max(0));
            self.state.baseline_day = Some(today);
        }
        if let Err(err) = scalars.save(&self.state) {
            warn!("failed to persist scalar state: {err}");
        }
        new_cycles
    }

    fn refresh_official_health(&mut self, now: DateTime<Utc>, telemetry: &dyn TelemetrySource) {
        let fresh = self
            .state
            .official_health_fetched_at
            .map(|at| now - at < Duration::minutes(OFFICIAL_HEALTH_TTL_MINUTES))
            .unwrap_or(false);
        if fresh {
            return;
        }
        // A failed fetch keeps the cached value; the next tick retries.
        if let Some(percent) = telemetry.official_health_percent() {
            self.state.official_health_percent = Some(percent);
            self.state.official_health_fetched_at = Some(now);
        }
    }
}

/// Read the day's record or start a fresh one.
pub(crate) fn fetch_or_new(records: &dyn RecordStore, day: NaiveDate) -> DailyRecord {
    records.get(day).unwrap_or_else(|| DailyRecord::new(day))
}

/// Write a record back, logging instead of failing the tick on store errors.
pub(crate) fn store_record(records: &mut dyn RecordStore, record: DailyRecord) {
    let day = record.day;
    if let Err(err) = records.put(record) {
        warn!(%day, "failed to persist daily record: {err}");
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeTelemetry;
    use super::*;
    use crate::clock::FixedClock;
    use crate::records::MemoryRecordStore;
    use crate::scalars::MemoryScalarStore;
    use crate::telemetry::Capacity;
    use pretty_assertions::assert_eq;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn discharging_telemetry() -> FakeTelemetry {
        FakeTelemetry {
            cycle_count: Some(400),
            capacity: Some(Capacity {
                current_mah: 3900,
                max_mah: 4000,
            }),
            design_capacity: Some(4000),
            health_text: Some("Good".to_string()),
            official_health_percent: Some(91),
            power_source: PowerSource::Battery,
            time_remaining: None,
        }
    }

    #[test]
    fn test_tick_publishes_and_persists() {
        let clock = FixedClock::utc(utc("2026-02-17T10:00:00Z"));
        let telemetry = discharging_telemetry();
        let mut records = MemoryRecordStore::new();
        let mut scalars = MemoryScalarStore::new();
        let mut engine = Engine::new(EngineConfig::default(), ScalarState::default());

        let snapshot = engine.tick(&clock, &telemetry, &mut records, &mut scalars);

        assert_eq!(snapshot.day, "2026-02-17".parse().unwrap());
        assert_eq!(snapshot.cycle_count, Some(400));
        assert_eq!(snapshot.cycles_today, Some(0));
        assert_eq!(snapshot.mah_to_next_cycle, Some(4000));
        assert_eq!(snapshot.official_health_percent, Some(91));
        assert!(snapshot.has_telemetry());

        // Everything the next tick needs survived into the scalar store.
        let saved = scalars.state();
        assert_eq!(saved.baseline_day, Some(snapshot.day));
        assert_eq!(saved.baseline_count, Some(400));
        assert_eq!(saved.last_cycle_count, Some(400));
        assert_eq!(saved.last_sample_day, Some(snapshot.day));
    }

    #[test]
    fn test_tick_without_telemetry_degrades() {
        let clock = FixedClock::utc(utc("2026-02-17T10:00:00Z"));
        let telemetry = FakeTelemetry::default();
        let mut records = MemoryRecordStore::new();
        let mut scalars = MemoryScalarStore::new();
        let mut engine = Engine::new(EngineConfig::default(), ScalarState::default());

        let snapshot = engine.tick(&clock, &telemetry, &mut records, &mut scalars);

        assert_eq!(snapshot.cycles_today, None);
        assert_eq!(snapshot.mah_to_next_cycle, None);
        assert_eq!(snapshot.time_remaining, TimeEstimate::Unavailable);
        assert_eq!(snapshot.time_to_next_cycle, Projection::Unavailable);
        assert!(!snapshot.has_telemetry());
    }

    #[test]
    fn test_official_health_is_rate_limited() {
        let mut clock = FixedClock::utc(utc("2026-02-17T10:00:00Z"));
        let mut telemetry = discharging_telemetry();
        let mut records = MemoryRecordStore::new();
        let mut scalars = MemoryScalarStore::new();
        let mut engine = Engine::new(EngineConfig::default(), ScalarState::default());

        engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        assert_eq!(engine.state().official_health_percent, Some(91));

        // Within the TTL the newer platform value is ignored.
        telemetry.official_health_percent = Some(88);
        clock.advance(Duration::minutes(5));
        engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        assert_eq!(engine.state().official_health_percent, Some(91));

        clock.advance(Duration::minutes(6));
        engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        assert_eq!(engine.state().official_health_percent, Some(88));
    }

    #[test]
    fn test_official_health_failure_keeps_cache() {
        let mut clock = FixedClock::utc(utc("2026-02-17T10:00:00Z"));
        let mut telemetry = discharging_telemetry();
        let mut records = MemoryRecordStore::new();
        let mut scalars = MemoryScalarStore::new();
        let mut engine = Engine::new(EngineConfig::default(), ScalarState::default());

        engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        telemetry.official_health_percent = None;
        clock.advance(Duration::minutes(20));
        let snapshot = engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        assert_eq!(snapshot.official_health_percent, Some(91));
    }

    #[test]
    fn test_increment_today_cycle_re_anchors_baseline() {
        let clock = FixedClock::utc(utc("2026-02-17T10:00:00Z"));
        let telemetry = discharging_telemetry();
        let mut records = MemoryRecordStore::new();
        let mut scalars = MemoryScalarStore::new();
        let mut engine = Engine::new(EngineConfig::default(), ScalarState::default());

        engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        let bumped = engine.increment_today_cycle(&clock, &telemetry, &mut records, &mut scalars);
        assert_eq!(bumped, 1);

        // The next tick must re-derive the bumped value, not reset it.
        let snapshot = engine.tick(&clock, &telemetry, &mut records, &mut scalars);
        assert_eq!(snapshot.cycles_today, Some(1));
        assert_eq!(engine.state().baseline_count, Some(399));
    }
}
