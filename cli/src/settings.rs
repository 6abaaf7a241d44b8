//! Runtime settings for the PMU server, read from the environment.
//!
//! | Variable           | Default      |
//! |--------------------|--------------|
//! | `PMU_HOST`         | `0.0.0.0`    |
//! | `PMU_PORT`         | `4712`       |
//! | `PMU_IDCODE`       | `1`          |
//! | `PMU_STATION_NAME` | `SIM_PMU_1`  |
//! | `PMU_DATA_RATE`    | `50`         |
//! | `PMU_PHASORS`      | `3`          |
//! | `PMU_ANALOGS`      | `4`          |
//! | `PMU_ENFORCE_CRC`  | `true`       |
//! | `PMU_STATION_FILE` | unset        |
//!
//! When `PMU_STATION_FILE` names a JSON `StationConfig`, it replaces the default station
//! and the other station variables are applied on top of it.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use pmusim_core::ieee_c37_118::commands::CommandOptions;
use pmusim_core::ieee_c37_118::config::{ConfigError, Station, StationConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4712;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
    #[error("cannot read station file {}: {source}", path.display())]
    StationFile { path: PathBuf, source: io::Error },
    #[error("invalid station file {}: {source}", path.display())]
    StationJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid station: {0}")]
    Station(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub station: StationConfig,
    pub enforce_crc: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            station: StationConfig::default(),
            enforce_crc: true,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from any variable lookup, so tests need not touch the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(path) = lookup("PMU_STATION_FILE") {
            settings.station = load_station_file(Path::new(&path))?;
        }
        if let Some(host) = lookup("PMU_HOST") {
            settings.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PMU_PORT")? {
            settings.port = port;
        }
        if let Some(enforce) = parse_var(&lookup, "PMU_ENFORCE_CRC")? {
            settings.enforce_crc = enforce;
        }

        let station = &mut settings.station;
        if let Some(idcode) = parse_var(&lookup, "PMU_IDCODE")? {
            station.idcode = idcode;
        }
        if let Some(name) = lookup("PMU_STATION_NAME") {
            station.station_name = name;
        }
        if let Some(rate) = parse_var(&lookup, "PMU_DATA_RATE")? {
            station.data_rate = rate;
        }
        let phasors = parse_var(&lookup, "PMU_PHASORS")?;
        let analogs = parse_var(&lookup, "PMU_ANALOGS")?;
        settings.resize_channels(phasors, analogs);

        Ok(settings)
    }

    /// Replaces the phasor and/or analog lists with the simulator's default layout.
    pub fn resize_channels(&mut self, phasors: Option<usize>, analogs: Option<usize>) {
        if phasors.is_none() && analogs.is_none() {
            return;
        }
        let station = &mut self.station;
        let layout = StationConfig::simulated(
            station.idcode,
            &station.station_name,
            station.data_rate,
            phasors.unwrap_or(station.phasors.len()),
            analogs.unwrap_or(station.analogs.len()),
        );
        if phasors.is_some() {
            station.phasors = layout.phasors;
        }
        if analogs.is_some() {
            station.analogs = layout.analogs;
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            enforce_crc: self.enforce_crc,
        }
    }

    /// Validates the station description.
    pub fn station(&self) -> Result<Station, SettingsError> {
        Ok(self.station.clone().validate()?)
    }
}

pub fn load_station_file(path: &Path) -> Result<StationConfig, SettingsError> {
    let text = fs::read_to_string(path).map_err(|source| SettingsError::StationFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SettingsError::StationJson {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::InvalidVar { name, value }),
        None => Ok(None),
    }
}
