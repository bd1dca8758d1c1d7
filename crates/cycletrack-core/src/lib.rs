//! Core library for cycletrack - battery cycle accounting.
//!
//! Derives durable, date-keyed statistics (cycles gained per day, fractional
//! cycle progress, charge moved, time per power source) from noisy periodic
//! battery telemetry, plus forward projections and a CSV backup codec.
//!
//! The engine is synchronous and single-writer: a host polling loop calls
//! [`Engine::tick`] with a clock, a telemetry source, and the two stores, and
//! every derived value is re-derivable from persisted state plus the next
//! sample.

pub mod backup;
pub mod clock;
pub mod engine;
pub mod migrate;
pub mod records;
pub mod scalars;
pub mod telemetry;

pub use backup::{export_backup, restore_backup, BackupError, ImportReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{format_duration, Engine, EngineConfig, Projection, Snapshot, TimeEstimate};
pub use records::{
    CycleBreakdown, DailyRecord, JsonRecordStore, MemoryRecordStore, RecordStore, StoreError,
};
pub use scalars::{JsonScalarStore, MemoryScalarStore, ScalarState, ScalarStore};
pub use telemetry::{Capacity, PowerSource, TelemetrySource, TimeRemaining};
