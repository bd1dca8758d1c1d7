use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cycletrack_core::{
    export_backup, migrate, restore_backup, Engine, JsonRecordStore, JsonScalarStore, RecordStore,
    ScalarStore, SystemClock,
};

use cycletrack::config::{Command, Config, Settings};
use cycletrack::monitor::{PollMessage, Poller};
use cycletrack::report;
use cycletrack::telemetry::SysfsTelemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug);

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    let data_dir = settings.data_dir();
    let records_path = data_dir.join("records.json");
    let state_path = data_dir.join("state.json");

    match cli.command {
        Some(Command::Where) => {
            println!("records: {}", records_path.display());
            println!("state:   {}", state_path.display());
            println!("config:  {}", config_hint(cli.config.as_ref()));
            Ok(())
        }
        Some(Command::Export { dir }) => {
            let records = open_records(&records_path)?;
            let (daily, breakdowns) = export_backup(&records.all(), &dir, &SystemClock)?;
            println!("wrote {}", daily.display());
            println!("wrote {}", breakdowns.display());
            Ok(())
        }
        Some(Command::Restore { files }) => {
            let mut records = open_records(&records_path)?;
            let report = restore_backup(&files, &mut records, &SystemClock)?;
            println!(
                "restored {} days ({} skipped), {} breakdowns ({} skipped)",
                report.inserted_daily,
                report.skipped_daily,
                report.inserted_breakdowns,
                report.skipped_breakdowns,
            );
            Ok(())
        }
        Some(Command::Status) => {
            let (mut engine, mut records, mut scalars) =
                open_engine(&settings, &records_path, &state_path, &data_dir)?;
            let telemetry = open_telemetry(&settings)?;
            let snapshot = engine.tick(&SystemClock, &telemetry, &mut records, &mut scalars);
            println!("{}", report::render(&snapshot));
            Ok(())
        }
        None => {
            let (engine, records, scalars) =
                open_engine(&settings, &records_path, &state_path, &data_dir)?;
            let telemetry = open_telemetry(&settings)?;
            let poller = Poller::new(
                settings,
                engine,
                telemetry,
                Box::new(records),
                Box::new(scalars),
                cli.detail,
            );
            watch(poller.start()).await;
            Ok(())
        }
    }
}

async fn watch(mut rx: tokio::sync::mpsc::Receiver<PollMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            PollMessage::Updated(snapshot) => {
                println!("{}\n", report::render(&snapshot));
            }
            PollMessage::Error(message) => {
                warn!("{message}");
            }
        }
    }
}

fn open_records(path: &Path) -> Result<JsonRecordStore> {
    JsonRecordStore::open(path)
        .with_context(|| format!("Failed to open record store: {}", path.display()))
}

fn open_engine(
    settings: &Settings,
    records_path: &Path,
    state_path: &Path,
    data_dir: &Path,
) -> Result<(Engine, JsonRecordStore, JsonScalarStore)> {
    let mut records = open_records(records_path)?;
    let mut scalars = JsonScalarStore::open(state_path);
    let mut state = scalars
        .load()
        .with_context(|| format!("Failed to load scalar state: {}", state_path.display()))?;

    import_legacy(data_dir, &mut records, &mut state, &mut scalars)?;

    Ok((
        Engine::new(settings.engine_config(), state),
        records,
        scalars,
    ))
}

/// Import the pre-0.3 flat day -> cycles map, if one is still around.
fn import_legacy(
    data_dir: &Path,
    records: &mut JsonRecordStore,
    state: &mut cycletrack_core::ScalarState,
    scalars: &mut JsonScalarStore,
) -> Result<()> {
    if state.legacy_cycles_imported {
        return Ok(());
    }
    let legacy_path = data_dir.join("daily_cycles.json");
    if !legacy_path.exists() {
        return Ok(());
    }

    let content = std::fs::read_to_string(&legacy_path)
        .with_context(|| format!("Failed to read legacy file: {}", legacy_path.display()))?;
    let legacy: BTreeMap<NaiveDate, i64> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse legacy file: {}", legacy_path.display()))?;

    let imported = migrate::import_legacy_daily_cycles(&legacy, records, state)?;
    scalars.save(state)?;
    if imported > 0 {
        info!(
            "imported {imported} day(s) from {}",
            legacy_path.display()
        );
    }
    Ok(())
}

fn open_telemetry(settings: &Settings) -> Result<SysfsTelemetry> {
    if let Some(ref path) = settings.battery_path {
        return Ok(SysfsTelemetry::with_battery_path(path.clone()));
    }
    match SysfsTelemetry::discover() {
        Some(telemetry) => Ok(telemetry),
        None => bail!("no battery found under /sys/class/power_supply"),
    }
}

fn config_hint(custom: Option<&PathBuf>) -> String {
    if let Some(path) = custom {
        return path.display().to_string();
    }
    dirs::config_dir()
        .map(|p| p.join("cycletrack/config.toml").display().to_string())
        .unwrap_or_else(|| "~/.config/cycletrack/config.toml".to_string())
}

fn setup_logging(debug: bool) {
    let filter = EnvFilter::new(log_directives(debug));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Filter directives covering both the binary and the core crate, so engine
/// degradation warnings are not silently dropped.
fn log_directives(debug: bool) -> &'static str {
    if debug {
        "cycletrack=debug,cycletrack_core=debug"
    } else {
        "cycletrack=info,cycletrack_core=info"
    }
}
