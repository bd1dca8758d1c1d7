mod sysfs;

pub use sysfs::SysfsTelemetry;
