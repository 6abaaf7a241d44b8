//! # Synthetic Measurement Sources
//!
//! Measurement sources used by the simulator and its tests.
//!
//! - `RandomSource`: Uniform noise around nominal values, the simulator's default.
//! - `ConstantSource`: The same measurement every time, for deterministic tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::Station;
use super::data_frame::{Measurement, MeasurementSource, PhasorValue};

const NOMINAL_MAGNITUDE: f32 = 230.0;
const MAGNITUDE_SPREAD: f32 = 5.0;
const FREQUENCY_SPREAD: f32 = 0.05;
const ROCOF_SPREAD: f32 = 0.5;
const ANALOG_MAX: f32 = 10.0;

/// Random telemetry generator.
///
/// # Ranges
///
/// * Phasor magnitude: 230 ± 5.
/// * Phasor angle: -180° to 180°.
/// * FREQ: station nominal frequency ± 0.05 Hz.
/// * DFREQ: ± 0.5 Hz/s.
/// * Analogs: 0 to 10.
#[derive(Debug)]
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn new() -> Self {
        RandomSource {
            rng: StdRng::from_os_rng(),
        }
    }

    /// A reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        RandomSource {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSource for RandomSource {
    fn measure(&mut self, station: &Station) -> Measurement {
        let rng = &mut self.rng;
        let phasors = (0..station.phasor_count())
            .map(|_| PhasorValue {
                magnitude: NOMINAL_MAGNITUDE
                    + rng.random_range(-MAGNITUDE_SPREAD..=MAGNITUDE_SPREAD),
                angle_deg: rng.random_range(-180.0..=180.0),
            })
            .collect();
        let freq = station.nominal_frequency.hertz()
            + rng.random_range(-FREQUENCY_SPREAD..=FREQUENCY_SPREAD);
        let rocof = rng.random_range(-ROCOF_SPREAD..=ROCOF_SPREAD);
        let analogs = (0..station.analog_count())
            .map(|_| rng.random_range(0.0..=ANALOG_MAX))
            .collect();

        Measurement {
            phasors,
            freq,
            rocof,
            analogs,
        }
    }
}

/// Returns a fixed measurement shaped to the station.
///
/// Every phasor gets `phasor`, every analog gets `analog`.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource {
    pub phasor: PhasorValue,
    pub freq: f32,
    pub rocof: f32,
    pub analog: f32,
}

impl Default for ConstantSource {
    fn default() -> Self {
        ConstantSource {
            phasor: PhasorValue {
                magnitude: NOMINAL_MAGNITUDE,
                angle_deg: 0.0,
            },
            freq: 50.0,
            rocof: 0.0,
            analog: 1.0,
        }
    }
}

impl MeasurementSource for ConstantSource {
    fn measure(&mut self, station: &Station) -> Measurement {
        Measurement {
            phasors: vec![self.phasor; station.phasor_count()],
            freq: self.freq,
            rocof: self.rocof,
            analogs: vec![self.analog; station.analog_count()],
        }
    }
}
