//! # Station Configuration and Configuration Frame 2
//!
//! This module holds the description of the simulated PMU and builds the configuration
//! frame (CFG-2) that announces it to a Phasor Data Concentrator.
//!
//! ## Key Components
//!
//! - `StationConfig`: Serde-loadable station description (ID, names, rates, channels,
//!   format flags).
//! - `Station`: A validated, immutable `StationConfig`. Frame builders and sessions only
//!   accept this type, so an unsupported format cannot reach the encoder.
//! - `build_configuration_frame`: Encodes a `Station` as a complete, checksummed CFG-2.
//!
//! ## CFG-2 layout
//!
//! ```text
//! SYNC(1) TYPE(1) FRAMESIZE(2) IDCODE(2) SOC(4) FRACSEC(4) TIME_BASE(4) NUM_PMU(2)
//! STN(16) IDCODE(2) FORMAT(2) PHNMR(2) ANNMR(2) DGNMR(2)
//! CHNAM(16 x (PHNMR + ANNMR)) PHUNIT(4 x PHNMR) ANUNIT(4 x ANNMR)
//! FNOM(2) CFGCNT(2) DATA_RATE(2) CHK(2)
//! ```

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codec::{FrameBuilder, NAME_SIZE};
use super::common::FrameType;
use super::units::{AnalogUnits, DataFormat, NominalFrequency, PhasorUnits};
use super::utils::FrameTime;

/// Highest data rate whose emission interval is still at least one millisecond.
pub const MAX_DATA_RATE: u16 = 1000;

/// TIME_BASE is transmitted in the low 24 bits of a 32-bit field.
pub const MAX_TIME_BASE: u32 = 0x00FF_FFFF;

/// CFG-2 bytes that do not depend on the channel count, CHK included.
pub const CONFIG_FRAME_FIXED_SIZE: usize = 54;

/// CFG-2 bytes per phasor or analog channel: CHNAM plus PHUNIT/ANUNIT.
pub const CHANNEL_DESCRIPTOR_SIZE: usize = NAME_SIZE + 4;

/// Errors raised while validating a station configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported data format {0}: only floating-point/polar can be encoded")]
    UnsupportedFormat(DataFormat),
    #[error("invalid data rate {0}: must be between 1 and {max} frames per second", max = MAX_DATA_RATE)]
    InvalidDataRate(u16),
    #[error("invalid time base {0}: must be between 1 and {max}", max = MAX_TIME_BASE)]
    InvalidTimeBase(u32),
    #[error("name {0:?} is not ASCII")]
    InvalidName(String),
    #[error("too many channels: {phasors} phasors and {analogs} analogs do not fit a frame")]
    TooManyChannels { phasors: usize, analogs: usize },
    #[error("channel {channel:?}: scale factor {factor} does not fit 24 bits")]
    InvalidScaleFactor { channel: String, factor: i64 },
}

/// A phasor channel: its name and conversion factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasorChannel {
    pub name: String,
    pub units: PhasorUnits,
}

/// An analog channel: its name and conversion factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogChannel {
    pub name: String,
    pub units: AnalogUnits,
}

/// Description of the simulated PMU.
///
/// Digital status channels are not supported; DGNMR is always transmitted as 0.
///
/// # Fields
///
/// * `idcode`: PMU identification code, used in every frame and in command addressing.
/// * `station_name`: Station name, transmitted as a 16-byte space-padded field.
/// * `time_base`: Ticks per second announced for FRACSEC.
/// * `nominal_frequency`: FNOM.
/// * `data_rate`: Data frames per second.
/// * `phasors`: Phasor channels in transmission order.
/// * `analogs`: Analog channels in transmission order.
/// * `format`: Numeric and phasor representation.
/// * `cfgcnt`: Configuration change count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub idcode: u16,
    pub station_name: String,
    pub time_base: u32,
    pub nominal_frequency: NominalFrequency,
    pub data_rate: u16,
    pub phasors: Vec<PhasorChannel>,
    pub analogs: Vec<AnalogChannel>,
    pub format: DataFormat,
    pub cfgcnt: u16,
}

impl StationConfig {
    /// Builds a station with the simulator's channel layout.
    ///
    /// Phasors are named `Phasor 1..n`; the first is a voltage channel and all the others
    /// are current channels. Analogs are named `Analog 1..n` with a factor of 100.
    pub fn simulated(
        idcode: u16,
        station_name: &str,
        data_rate: u16,
        phasor_count: usize,
        analog_count: usize,
    ) -> Self {
        let phasors = (0..phasor_count)
            .map(|i| PhasorChannel {
                name: format!("Phasor {}", i + 1),
                units: if i == 0 {
                    PhasorUnits::voltage()
                } else {
                    PhasorUnits::current()
                },
            })
            .collect();
        let analogs = (0..analog_count)
            .map(|i| AnalogChannel {
                name: format!("Analog {}", i + 1),
                units: AnalogUnits::simulated(),
            })
            .collect();

        StationConfig {
            idcode,
            station_name: station_name.to_string(),
            time_base: 1_000_000,
            nominal_frequency: NominalFrequency::Hz50,
            data_rate,
            phasors,
            analogs,
            format: DataFormat::float_polar(),
            cfgcnt: 0,
        }
    }

    /// Checks the configuration and freezes it.
    ///
    /// # Returns
    ///
    /// * `Ok(Station)`: The validated station.
    /// * `Err(ConfigError)`: The first problem found. Unsupported format combinations are
    ///   reported here, never at encode time.
    pub fn validate(self) -> Result<Station, ConfigError> {
        if !self.format.is_supported() {
            return Err(ConfigError::UnsupportedFormat(self.format));
        }
        if self.data_rate == 0 || self.data_rate > MAX_DATA_RATE {
            return Err(ConfigError::InvalidDataRate(self.data_rate));
        }
        if self.time_base == 0 || self.time_base > MAX_TIME_BASE {
            return Err(ConfigError::InvalidTimeBase(self.time_base));
        }

        let names = std::iter::once(&self.station_name)
            .chain(self.phasors.iter().map(|ph| &ph.name))
            .chain(self.analogs.iter().map(|an| &an.name));
        for name in names {
            if !name.is_ascii() {
                return Err(ConfigError::InvalidName(name.clone()));
            }
        }

        for phasor in &self.phasors {
            if !phasor.units.fits_24_bits() {
                return Err(ConfigError::InvalidScaleFactor {
                    channel: phasor.name.clone(),
                    factor: phasor.units.scale_factor as i64,
                });
            }
        }
        for analog in &self.analogs {
            if !analog.units.fits_24_bits() {
                return Err(ConfigError::InvalidScaleFactor {
                    channel: analog.name.clone(),
                    factor: analog.units.scale_factor as i64,
                });
            }
        }

        // The configuration frame is the larger of the two and must fit FRAMESIZE.
        let size = configuration_frame_size(self.phasors.len(), self.analogs.len());
        if size > u16::MAX as usize {
            return Err(ConfigError::TooManyChannels {
                phasors: self.phasors.len(),
                analogs: self.analogs.len(),
            });
        }

        Ok(Station { config: self })
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig::simulated(1, "SIM_PMU_1", 50, 3, 4)
    }
}

/// A validated station configuration. Immutable for the life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    config: StationConfig,
}

impl Station {
    pub fn phasor_count(&self) -> usize {
        self.config.phasors.len()
    }

    pub fn analog_count(&self) -> usize {
        self.config.analogs.len()
    }

    /// Length in bytes of this station's CFG-2.
    pub fn configuration_frame_size(&self) -> usize {
        configuration_frame_size(self.phasor_count(), self.analog_count())
    }

    /// Length in bytes of every data frame this station emits.
    pub fn data_frame_size(&self) -> usize {
        // Header, SOC, FRACSEC, STAT, FREQ, DFREQ, CHK.
        6 + 4 + 4 + 2 + 4 + 4 + 2 + 8 * self.phasor_count() + 4 * self.analog_count()
    }

    pub fn into_inner(self) -> StationConfig {
        self.config
    }
}

impl Deref for Station {
    type Target = StationConfig;

    fn deref(&self) -> &StationConfig {
        &self.config
    }
}

fn configuration_frame_size(phasors: usize, analogs: usize) -> usize {
    CONFIG_FRAME_FIXED_SIZE + CHANNEL_DESCRIPTOR_SIZE * (phasors + analogs)
}

/// Builds configuration frame 2 stamped with the current second.
pub fn build_configuration_frame(station: &Station) -> Vec<u8> {
    build_configuration_frame_at(station, FrameTime::now_whole_seconds())
}

/// Builds configuration frame 2 with an explicit timestamp.
pub fn build_configuration_frame_at(station: &Station, time: FrameTime) -> Vec<u8> {
    let phnmr = station.phasors.len();
    let annmr = station.analogs.len();
    let mut frame = FrameBuilder::new(
        FrameType::Config2,
        station.idcode,
        station.configuration_frame_size(),
    );

    frame
        .put_u32(time.soc)
        .put_u32(time.fracsec)
        .put_u32(station.time_base)
        .put_u16(1); // NUM_PMU

    frame
        .put_name(&station.station_name)
        .put_u16(station.idcode)
        .put_u16(station.format.to_raw())
        .put_u16(phnmr as u16)
        .put_u16(annmr as u16)
        .put_u16(0); // DGNMR

    for phasor in &station.phasors {
        frame.put_name(&phasor.name);
    }
    for analog in &station.analogs {
        frame.put_name(&analog.name);
    }
    for phasor in &station.phasors {
        frame.put_slice(&phasor.units.to_hex());
    }
    for analog in &station.analogs {
        frame.put_slice(&analog.units.to_hex());
    }

    frame
        .put_u16(station.nominal_frequency.code())
        .put_u16(station.cfgcnt)
        .put_i16(station.data_rate as i16);

    frame.finish()
}
