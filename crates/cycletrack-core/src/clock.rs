//! Timezone-aware clock abstraction.
//!
//! All day-boundary logic in the engine goes through [`Clock`] so that
//! midnight rollovers and DST transitions are testable with a fixed offset
//! instead of the machine's local timezone.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Source of "now" and of local calendar-day arithmetic.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar day an instant falls on.
    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate;

    /// Instant of local midnight at the start of a day.
    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc>;

    /// Today's local calendar day.
    fn today(&self) -> NaiveDate {
        self.day_of(self.now())
    }
}

/// Real clock on the system local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&Local).date_naive()
    }

    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        match Local.from_local_datetime(&midnight).earliest() {
            Some(instant) => instant.with_timezone(&Utc),
            // Local midnight skipped by a DST transition.
            None => Utc.from_utc_datetime(&midnight),
        }
    }
}

/// Deterministic clock with a settable "now" and a fixed UTC offset.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// Clock pinned to UTC.
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, FixedOffset::east_opt(0).unwrap())
    }

    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn advance(&mut self, delta: chrono::Duration) {
        self.now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        match self.offset.from_local_datetime(&midnight).single() {
            Some(instant) => instant.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&midnight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_fixed_clock_day_follows_offset() {
        // 23:30 UTC is already the next day at UTC+2.
        let clock = FixedClock::new(
            utc("2026-03-01T23:30:00Z"),
            FixedOffset::east_opt(2 * 3600).unwrap(),
        );
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());

        let utc_clock = FixedClock::utc(utc("2026-03-01T23:30:00Z"));
        assert_eq!(
            utc_clock.today(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_start_of_day_round_trips() {
        let clock = FixedClock::new(
            utc("2026-03-01T12:00:00Z"),
            FixedOffset::west_opt(5 * 3600).unwrap(),
        );
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let midnight = clock.start_of_day(day);
        assert_eq!(clock.day_of(midnight), day);
        // One second before local midnight belongs to the previous day.
        assert_eq!(
            clock.day_of(midnight - Duration::seconds(1)),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_advance_crosses_midnight() {
        let mut clock = FixedClock::utc(utc("2026-03-01T23:59:00Z"));
        let before = clock.today();
        clock.advance(Duration::minutes(2));
        assert_eq!(before.succ_opt().unwrap(), clock.today());
    }
}
