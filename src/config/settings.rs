use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cycletrack_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Battery cycle accounting monitor")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Polling interval in seconds
    #[arg(short = 'i', long)]
    pub poll_interval: Option<u64>,

    /// Directory holding records and state files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Poll at the tighter detail interval
    #[arg(long)]
    pub detail: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print one snapshot and exit
    Status,
    /// Export daily records as CSV backup tables
    Export {
        /// Directory to write the tables into
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Replace all daily records from CSV backup tables
    Restore {
        /// Backup files (matched by name, any order)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the data file locations
    Where,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Polling interval while a detail view is open (seconds)
    #[serde(default = "default_detail_poll_interval")]
    pub detail_poll_interval_secs: u64,

    /// Lifetime cycle count to reach by the deadline
    #[serde(default = "default_target_total_cycles")]
    pub target_total_cycles: i64,

    /// Deadline for the cycle target
    #[serde(default = "default_target_deadline")]
    pub target_deadline: NaiveDate,

    /// Low-charge threshold as a percentage of maximum capacity
    #[serde(default = "default_low_charge_percent")]
    pub low_charge_percent: f64,

    /// Explicit battery sysfs directory (autodetected when unset)
    #[serde(default)]
    pub battery_path: Option<PathBuf>,

    /// Directory holding records and state files
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_detail_poll_interval() -> u64 {
    1
}

fn default_target_total_cycles() -> i64 {
    1000
}

fn default_target_deadline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
}

fn default_low_charge_percent() -> f64 {
    10.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            detail_poll_interval_secs: default_detail_poll_interval(),
            target_total_cycles: default_target_total_cycles(),
            target_deadline: default_target_deadline(),
            low_charge_percent: default_low_charge_percent(),
            battery_path: None,
            data_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return Self::load_file(p);
            }
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("cycletrack/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/cycletrack/config.toml")),
            dirs::home_dir().map(|p| p.join(".cycletrack.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_file(path);
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(poll_interval) = cli.poll_interval {
            self.poll_interval_secs = poll_interval;
        }
        if let Some(ref data_dir) = cli.data_dir {
            self.data_dir = Some(data_dir.clone());
        }
    }

    /// Validate and normalize settings values
    ///
    /// Ensures poll intervals have a minimum value to prevent CPU exhaustion
    /// and clamps the low-charge threshold to a sane percentage.
    pub fn validate(&mut self) {
        const MIN_POLL_INTERVAL: u64 = 1;

        if self.poll_interval_secs < MIN_POLL_INTERVAL {
            self.poll_interval_secs = MIN_POLL_INTERVAL;
        }
        if self.detail_poll_interval_secs < MIN_POLL_INTERVAL {
            self.detail_poll_interval_secs = MIN_POLL_INTERVAL;
        }
        self.low_charge_percent = self.low_charge_percent.clamp(0.0, 100.0);
    }

    /// Resolve the data directory, creating nothing.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("cycletrack")))
            .unwrap_or_else(|| PathBuf::from(".cycletrack"))
    }

    /// Engine tuning derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            target_total_cycles: self.target_total_cycles,
            target_deadline: self.target_deadline,
            low_charge_percent: self.low_charge_percent,
        }
    }
}
