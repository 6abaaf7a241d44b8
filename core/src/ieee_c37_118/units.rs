//! # IEEE C37.118 Measurement Units and Format Flags
//!
//! Conversion factors and format descriptors carried in configuration frames.
//!
//! ## Key Components
//!
//! - `PhasorUnits`: Voltage/current flag and 24-bit scale factor of a phasor channel.
//! - `AnalogUnits`: Measurement type and 24-bit signed scale of an analog channel.
//! - `NominalFrequency`: The FNOM field (50 Hz or 60 Hz).
//! - `DataFormat`: Numeric and phasor representation, encoded as the FORMAT word.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines scaling factors for phasor measurements.
///
/// The most significant byte of PHUNIT is 0 for voltage and 1 for current; the low 24
/// bits are the scale factor in 10⁻⁵ V or A per bit. The factor is ignored by
/// consumers when phasors are transmitted as floats, but it is still sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasorUnits {
    pub is_current: bool,
    pub scale_factor: u32,
}

impl PhasorUnits {
    pub const MAX_SCALE_FACTOR: u32 = 0x00FF_FFFF;

    /// `0x00000001`, the voltage channel factor of the simulated station.
    pub fn voltage() -> Self {
        PhasorUnits {
            is_current: false,
            scale_factor: 1,
        }
    }

    /// `0x01000001`, the current channel factor of the simulated station.
    pub fn current() -> Self {
        PhasorUnits {
            is_current: true,
            scale_factor: 1,
        }
    }

    /// The factor occupies the low 24 bits of PHUNIT.
    pub fn fits_24_bits(&self) -> bool {
        self.scale_factor <= Self::MAX_SCALE_FACTOR
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        if self.is_current {
            bytes[0] = 1;
        }
        bytes[1..].copy_from_slice(&self.scale_factor.to_be_bytes()[1..]);
        bytes
    }
}

/// Enumerates measurement types for analog channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementType {
    SinglePointOnWave,
    RmsOfAnalogInput,
    PeakOfAnalogInput,
}

impl MeasurementType {
    fn to_hex(self) -> u8 {
        match self {
            MeasurementType::SinglePointOnWave => 0,
            MeasurementType::RmsOfAnalogInput => 1,
            MeasurementType::PeakOfAnalogInput => 2,
        }
    }
}

/// Defines scaling and type for analog channels.
///
/// The most significant byte of ANUNIT is the measurement type; the low 24 bits are a
/// signed, user-defined scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogUnits {
    pub measurement_type: MeasurementType,
    pub scale_factor: i32,
}

impl AnalogUnits {
    /// `0x00000064`, the fixed analog factor of the simulated station.
    pub fn simulated() -> Self {
        AnalogUnits {
            measurement_type: MeasurementType::SinglePointOnWave,
            scale_factor: 100,
        }
    }

    /// The scale is a signed 24-bit value in the low bits of ANUNIT.
    pub fn fits_24_bits(&self) -> bool {
        (-(1 << 23)..(1 << 23)).contains(&self.scale_factor)
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        bytes[0] = self.measurement_type.to_hex();
        bytes[1..].copy_from_slice(&self.scale_factor.to_be_bytes()[1..]);
        bytes
    }
}

/// Specifies the nominal system frequency (FNOM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalFrequency {
    Hz50,
    Hz60,
}

impl NominalFrequency {
    /// FNOM code: 0 for the 50 Hz family, 1 for the 60 Hz family.
    pub fn code(&self) -> u16 {
        match self {
            NominalFrequency::Hz50 => 0,
            NominalFrequency::Hz60 => 1,
        }
    }

    pub fn hertz(&self) -> f32 {
        match self {
            NominalFrequency::Hz50 => 50.0,
            NominalFrequency::Hz60 => 60.0,
        }
    }
}

impl fmt::Display for NominalFrequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NominalFrequency::Hz50 => write!(f, "50 Hz"),
            NominalFrequency::Hz60 => write!(f, "60 Hz"),
        }
    }
}

/// Numeric representation of phasors, analogs and FREQ/DFREQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericFormat {
    Float,
    Fixed,
}

/// Coordinate system of phasor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhasorFormat {
    Polar,
    Rectangular,
}

/// Data format flags of a station.
///
/// Only `Float`/`Polar` can be encoded by the frame builders; other combinations are
/// rejected when the station configuration is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFormat {
    pub numeric: NumericFormat,
    pub phasor: PhasorFormat,
}

impl DataFormat {
    const POLAR: u16 = 0x0001;
    const PHASOR_FLOAT: u16 = 0x0002;
    const ANALOG_FLOAT: u16 = 0x0004;
    const FREQ_FLOAT: u16 = 0x0008;

    pub fn float_polar() -> Self {
        DataFormat {
            numeric: NumericFormat::Float,
            phasor: PhasorFormat::Polar,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.numeric == NumericFormat::Float && self.phasor == PhasorFormat::Polar
    }

    /// The FORMAT word of the configuration frame.
    pub fn to_raw(&self) -> u16 {
        let mut raw = 0;
        if self.phasor == PhasorFormat::Polar {
            raw |= Self::POLAR;
        }
        if self.numeric == NumericFormat::Float {
            raw |= Self::PHASOR_FLOAT | Self::ANALOG_FLOAT | Self::FREQ_FLOAT;
        }
        raw
    }
}

impl Default for DataFormat {
    fn default() -> Self {
        DataFormat::float_polar()
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let numeric = match self.numeric {
            NumericFormat::Float => "floating-point",
            NumericFormat::Fixed => "fixed-point",
        };
        let phasor = match self.phasor {
            PhasorFormat::Polar => "polar",
            PhasorFormat::Rectangular => "rectangular",
        };
        write!(f, "{}/{}", numeric, phasor)
    }
}
