//! Plain-text rendering of an engine snapshot.

use cycletrack_core::{format_duration, PowerSource, Projection, Snapshot, TimeEstimate};

const UNAVAILABLE: &str = "—";

/// Render a snapshot as the multi-line status report.
pub fn render(snapshot: &Snapshot) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Day:                 {}", snapshot.day));
    lines.push(format!(
        "Power source:        {}",
        snapshot.power_source.display_name()
    ));
    lines.push(format!(
        "Cycle count:         {}",
        opt_int(snapshot.cycle_count)
    ));
    lines.push(format!(
        "Health:              {}",
        health_line(snapshot.health_text.as_deref(), snapshot.official_health_percent)
    ));
    lines.push(format!(
        "Capacity:            {}",
        capacity_line(snapshot.current_capacity_mah, snapshot.max_capacity_mah)
    ));
    lines.push(format!(
        "Design capacity:     {}",
        match snapshot.design_capacity_mah {
            Some(design) => format!("{design} mAh"),
            None => UNAVAILABLE.to_string(),
        }
    ));
    lines.push(format!(
        "Cycles today:        {}",
        opt_int(snapshot.cycles_today)
    ));
    lines.push(format!(
        "Cycles/day needed:   {}",
        match snapshot.cycles_per_day_needed {
            Some(needed) => format!("{needed:.2}"),
            None => UNAVAILABLE.to_string(),
        }
    ));
    lines.push(format!(
        "mAh to next cycle:   {}",
        opt_int(snapshot.mah_to_next_cycle)
    ));
    lines.push(format!(
        "mAh used today:      {}",
        match snapshot.total_mah_used_today {
            Some(total) => format!("{total:.1}"),
            None => UNAVAILABLE.to_string(),
        }
    ));
    lines.push(format!(
        "Time remaining:      {}",
        time_remaining_line(snapshot.time_remaining)
    ));
    lines.push(format!(
        "Time to low charge:  {}",
        match snapshot.seconds_to_low_charge {
            Some(seconds) => format_duration(seconds),
            None => UNAVAILABLE.to_string(),
        }
    ));
    lines.push(format!(
        "Time to next cycle:  {}",
        next_cycle_line(snapshot.time_to_next_cycle)
    ));

    lines.join("\n")
}

fn opt_int(value: Option<i64>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => UNAVAILABLE.to_string(),
    }
}

fn capacity_line(current: Option<i64>, max: Option<i64>) -> String {
    match (current, max) {
        (Some(current), Some(max)) => format!("{current} / {max} mAh"),
        (Some(current), None) => format!("{current} mAh"),
        _ => UNAVAILABLE.to_string(),
    }
}

fn health_line(text: Option<&str>, official_percent: Option<i64>) -> String {
    match (text, official_percent) {
        (Some(text), Some(percent)) => format!("{text} ({percent}%)"),
        (Some(text), None) => text.to_string(),
        (None, Some(percent)) => format!("{percent}%"),
        (None, None) => UNAVAILABLE.to_string(),
    }
}

fn time_remaining_line(estimate: TimeEstimate) -> String {
    match estimate {
        TimeEstimate::Unavailable => UNAVAILABLE.to_string(),
        TimeEstimate::ToFull { seconds } => {
            format!("{} until full", format_duration(seconds))
        }
        TimeEstimate::ToEmpty { seconds } => {
            format!("{} until empty", format_duration(seconds))
        }
    }
}

fn next_cycle_line(projection: Projection) -> String {
    match projection {
        Projection::Unavailable => UNAVAILABLE.to_string(),
        Projection::Estimated { seconds } => format_duration(seconds),
        Projection::Paused { seconds } => {
            format!("{} (Paused)", format_duration(seconds))
        }
        Projection::Calculating { seconds } => {
            format!("{} (Unpaused - Calculating)", format_duration(seconds))
        }
    }
}
