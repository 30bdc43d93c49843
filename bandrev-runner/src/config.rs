//! TOML backtest configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! [data]
//! path = "data/BTC-USDT_15m.csv"
//! interval_minutes = 15
//! start = "2020-01-01T00:00:00"
//!
//! [contract]
//! leverage = 3.0
//! exit_pricing = "next_open"
//!
//! [blackout]
//! hour = 16
//! minute = 0
//!
//! [grid.n]
//! start = 300
//! stop = 600
//! step = 10
//!
//! [sweep]
//! workers = 8
//! output = "sweep.csv"
//!
//! [report]
//! locale = "zh"
//! labels = { cumulative_return = "Net value" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandrev_core::data::CleanOptions;
use bandrev_core::engine::{Blackout, ContractSpec};
use bandrev_core::ParamError;

use crate::labels::{LabelMap, Locale};
use crate::runner::RunSettings;
use crate::sweep::{GridError, ParamGrid};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid contract: {0}")]
    Contract(#[from] ParamError),
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
    #[error("invalid data section: interval_minutes must be positive and in range (got {0})")]
    Interval(i64),
    #[error("invalid blackout time {hour:02}:{minute:02}")]
    Blackout { hour: u32, minute: u32 },
    #[error("unknown report field '{0}' in [report.labels]")]
    UnknownReportField(String),
}

/// Full configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub contract: ContractSpec,
    pub blackout: BlackoutConfig,
    pub grid: ParamGrid,
    pub sweep: SweepConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Candle CSV. Required unless running on synthetic data.
    pub path: Option<PathBuf>,
    pub interval_minutes: i64,
    /// Bars before this timestamp are dropped.
    pub start: Option<NaiveDateTime>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval_minutes: 15,
            start: None,
        }
    }
}

impl DataConfig {
    pub fn clean_options(&self) -> Result<CleanOptions, ConfigError> {
        Ok(CleanOptions {
            interval: self.interval()?,
            start: self.start,
        })
    }

    fn interval(&self) -> Result<Duration, ConfigError> {
        Duration::try_minutes(self.interval_minutes)
            .filter(|d| *d > Duration::zero())
            .ok_or(ConfigError::Interval(self.interval_minutes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackoutConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
}

impl Default for BlackoutConfig {
    fn default() -> Self {
        let b = Blackout::default();
        Self {
            enabled: true,
            hour: b.hour,
            minute: b.minute,
        }
    }
}

impl BlackoutConfig {
    pub fn to_blackout(self) -> Option<Blackout> {
        self.enabled.then_some(Blackout {
            hour: self.hour,
            minute: self.minute,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub workers: usize,
    pub output: PathBuf,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            output: PathBuf::from("sweep_results.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub locale: Locale,
    /// Per-field display label overrides, keyed by field id.
    pub labels: BTreeMap<String, String>,
}

impl BacktestConfig {
    /// Read and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.data.interval()?;
        let BlackoutConfig { hour, minute, .. } = self.blackout;
        if hour >= 24 || minute >= 60 {
            return Err(ConfigError::Blackout { hour, minute });
        }
        self.contract.validate()?;
        self.grid.validate()?;
        self.label_map()?;
        Ok(())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            contract: self.contract,
            blackout: self.blackout.to_blackout(),
        }
    }

    /// Locale preset with the configured overrides applied.
    pub fn label_map(&self) -> Result<LabelMap, ConfigError> {
        LabelMap::for_locale(self.report.locale)
            .with_overrides(&self.report.labels)
            .map_err(ConfigError::UnknownReportField)
    }
}
