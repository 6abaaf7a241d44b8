//! # IEEE C37.118 Data Frame Builder
//!
//! This module turns one telemetry sample into a complete, checksummed data frame.
//!
//! ## Key Components
//!
//! - `MeasurementSource`: Anything that can produce a `Measurement` for a station. The
//!   simulator's random generator is one implementation; recorded or real data can be
//!   plugged in the same way.
//! - `Measurement`: Phasors (magnitude, angle in degrees), FREQ, DFREQ and analogs.
//! - `DataSample`: A measurement stamped with SOC/FRACSEC and a STAT word.
//! - `build_data_frame`: Samples a source at the current wall-clock time and encodes it.
//!
//! ## Data frame layout (floating-point, polar)
//!
//! ```text
//! SYNC(1) TYPE(1) FRAMESIZE(2) IDCODE(2) SOC(4) FRACSEC(4) STAT(2)
//! { MAGNITUDE(4) ANGLE_RAD(4) } x PHNMR  FREQ(4) DFREQ(4)  ANALOG(4) x ANNMR  CHK(2)
//! ```

use thiserror::Error;

use super::codec::FrameBuilder;
use super::common::{FrameType, StatField};
use super::config::Station;
use super::utils::FrameTime;

/// Raised when a frame cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("measurement has {actual} {channel} values, station expects {expected}")]
    ChannelCount {
        channel: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("frame of {size} bytes does not fit FRAMESIZE")]
    TooLarge { size: usize },
}

/// One phasor as produced by a measurement source.
///
/// The angle is in degrees; it is converted to radians when encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasorValue {
    pub magnitude: f32,
    pub angle_deg: f32,
}

impl PhasorValue {
    pub fn angle_rad(&self) -> f32 {
        self.angle_deg.to_radians()
    }
}

/// One set of channel values, in station channel order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measurement {
    pub phasors: Vec<PhasorValue>,
    /// FREQ field, in Hz.
    pub freq: f32,
    /// DFREQ field, rate of change of frequency in Hz/s.
    pub rocof: f32,
    pub analogs: Vec<f32>,
}

/// A measurement stamped for transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSample {
    pub time: FrameTime,
    pub stat: StatField,
    pub measurement: Measurement,
}

/// Produces measurements for a station.
pub trait MeasurementSource {
    /// Returns one value per phasor and analog channel of `station`.
    fn measure(&mut self, station: &Station) -> Measurement;
}

impl<S: MeasurementSource + ?Sized> MeasurementSource for Box<S> {
    fn measure(&mut self, station: &Station) -> Measurement {
        (**self).measure(station)
    }
}

/// Samples `source` now and encodes a data frame.
///
/// SOC/FRACSEC come from the wall clock with microsecond FRACSEC, independent of the
/// station time base. STAT always reports valid, synchronized data.
pub fn build_data_frame<S: MeasurementSource + ?Sized>(
    station: &Station,
    source: &mut S,
) -> Result<Vec<u8>, FrameError> {
    let sample = DataSample {
        time: FrameTime::now(),
        stat: StatField::valid_and_synced(),
        measurement: source.measure(station),
    };
    build_data_frame_at(station, &sample)
}

/// Encodes an already stamped sample.
pub fn build_data_frame_at(station: &Station, sample: &DataSample) -> Result<Vec<u8>, FrameError> {
    let measurement = &sample.measurement;
    check_count("phasor", station.phasor_count(), measurement.phasors.len())?;
    check_count("analog", station.analog_count(), measurement.analogs.len())?;

    let mut frame = FrameBuilder::new(FrameType::Data, station.idcode, station.data_frame_size());
    frame
        .put_u32(sample.time.soc)
        .put_u32(sample.time.fracsec)
        .put_u16(sample.stat.to_raw());

    for phasor in &measurement.phasors {
        frame.put_f32(phasor.magnitude).put_f32(phasor.angle_rad());
    }
    frame.put_f32(measurement.freq).put_f32(measurement.rocof);
    for &analog in &measurement.analogs {
        frame.put_f32(analog);
    }

    Ok(frame.finish())
}

fn check_count(channel: &'static str, expected: usize, actual: usize) -> Result<(), FrameError> {
    if expected != actual {
        return Err(FrameError::ChannelCount {
            channel,
            expected,
            actual,
        });
    }
    Ok(())
}
