//! Conversion of the accumulated sums into calibrated readings

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adc::{ADC_FULL_SCALE, SUPPLY_MILLIVOLTS};

#[derive(Debug, Error, PartialEq)]
pub enum MeasurementError {
    #[error("no samples were taken, the measurement window expired before the first sample")]
    NoSamples,
}

/// Calibration constants for one voltage/current sensor pair.
///
/// For an SCT-013-030 clamp (1V per 30A) `current` is 30. For a 9V AC adapter with
/// a 10:1 divider `voltage` is 250. `phase` of 1.0 means no correction, values above 1
/// extrapolate the voltage forward because current is read after voltage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationProfile {
    pub voltage: f32,
    pub current: f32,
    pub phase: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            voltage: 250.0,
            current: 30.0,
            phase: 1.12,
        }
    }
}

impl CalibrationProfile {
    pub fn voltage_ratio(&self) -> f32 {
        counts_to_units(self.voltage)
    }

    pub fn current_ratio(&self) -> f32 {
        counts_to_units(self.current)
    }

    /// Voltage interpolated between the last two filtered samples
    pub fn phase_shift(&self, last_filtered_v: f32, filtered_v: f32) -> f32 {
        last_filtered_v + self.phase * (filtered_v - last_filtered_v)
    }
}

fn counts_to_units(cal: f32) -> f32 {
    cal * ((SUPPLY_MILLIVOLTS as f32 / 1000.0) / ADC_FULL_SCALE as f32)
}

/// Running sums of one measurement window
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Accumulator {
    pub sum_v: f32,
    pub sum_i: f32,
    pub sum_p: f32,
}

/// Calibrated result of a measurement cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Measurement {
    pub vrms: f32,
    pub irms: f32,
    pub real_power: f32,
    pub apparent_power: f32,
    /// `None` when there is no apparent power to compare against
    pub power_factor: Option<f32>,
    pub samples: u32,
    pub crossings: u32,
    /// The window closed on timeout before reaching the crossing target
    pub timed_out: bool,
}

impl Measurement {
    pub fn scale(
        cal: &CalibrationProfile,
        sums: &Accumulator,
        samples: u32,
    ) -> Result<Self, MeasurementError> {
        if samples == 0 {
            return Err(MeasurementError::NoSamples);
        }
        let n = samples as f32;
        let v_ratio = cal.voltage_ratio();
        let i_ratio = cal.current_ratio();

        let vrms = v_ratio * (sums.sum_v / n).sqrt();
        let irms = i_ratio * (sums.sum_i / n).sqrt();
        let real_power = v_ratio * i_ratio * sums.sum_p / n;
        let apparent_power = vrms * irms;
        let power_factor = if apparent_power != 0.0 && apparent_power.is_finite() {
            Some(real_power / apparent_power)
        } else {
            None
        };

        Ok(Self {
            vrms,
            irms,
            real_power,
            apparent_power,
            power_factor,
            samples,
            crossings: 0,
            timed_out: false,
        })
    }
}

/// Current only RMS, same scaling as `Measurement::scale`
pub fn scale_irms(cal: &CalibrationProfile, sum_i: f32, samples: u32) -> Result<f32, MeasurementError> {
    if samples == 0 {
        return Err(MeasurementError::NoSamples);
    }
    Ok(cal.current_ratio() * (sum_i / samples as f32).sqrt())
}

impl Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} {:.2} {:.2} {:.2} ",
            self.real_power, self.apparent_power, self.vrms, self.irms
        )?;
        match self.power_factor {
            Some(pf) => write!(f, "{pf:.2}"),
            None => f.write_str("nan"),
        }
    }
}
