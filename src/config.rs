use crate::catalog::CatalogSource;
use crate::error::ConfigError;
use crate::poller::PollSchedule;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://espa.cr.usgs.gov/api/v1/";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub process: ProcessConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub catalogue: CatalogueConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ProcessConfig {
    pub download_catalogue: bool,
    pub product_id_filename: String,
    pub desired_sensors: Vec<String>,
    pub date_ranges: Vec<DateRange>,
    pub path_rows: Vec<String>,
    pub root_folder: PathBuf,
    #[serde(default = "default_jobs_filename")]
    pub jobs_filename: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub product_types: Vec<String>,
    pub output_format: String,
    pub excluded_collections: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            poll_interval_secs: 300,
            max_polls: 288,
            product_types: vec!["sr".into(), "bt".into(), "pixel_qa".into()],
            output_format: "gtiff".to_string(),
            excluded_collections: vec!["oli8_collection".into()],
        }
    }
}

impl ApiConfig {
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct CatalogueConfig {
    pub sources: Vec<CatalogSource>,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            sources: CatalogSource::landsat_collection1(),
        }
    }
}

fn default_jobs_filename() -> String {
    "jobs.txt".to_string()
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Unable to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.process.path_rows.is_empty() {
            return Err(ConfigError::Empty("path_row"));
        }
        if self.process.date_ranges.is_empty() {
            return Err(ConfigError::Empty("date range"));
        }
        if self.process.desired_sensors.is_empty() {
            return Err(ConfigError::Empty("desired sensor"));
        }
        Ok(())
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.process
            .root_folder
            .join(&self.process.product_id_filename)
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.process.root_folder.join(&self.process.jobs_filename)
    }

    /// Download directory for one tile: `root/L2/gz/{tile}`.
    pub fn download_dir(&self, path_row: &str) -> PathBuf {
        self.process
            .root_folder
            .join("L2")
            .join("gz")
            .join(path_row)
    }
}

/// Inclusive acquisition date window, compared as `YYYYMMDD` strings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn contains(&self, date: &str) -> bool {
        self.start.as_str() <= date && date <= self.end.as_str()
    }
}

impl FromStr for DateRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^(?<start>\d{8})_(?<end>\d{8})$").expect("Regex pattern should always compile")
        });

        let captures = re
            .captures(s.trim())
            .ok_or_else(|| ConfigError::DateRangeFormat(s.to_string()))?;
        let (_, [start, end]) = captures.extract();
        if start > end {
            return Err(ConfigError::DateRangeOrder(s.to_string()));
        }
        Ok(Self {
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

impl TryFrom<String> for DateRange {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateRange> for String {
    fn from(range: DateRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.start, self.end)
    }
}
