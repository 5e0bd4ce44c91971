//! Synthetic mains source with a simulated clock, to run the monitor off-target

use std::f64::consts::PI;

use embedded_hal::blocking::delay::DelayUs;

use crate::adc::{ADC_FULL_SCALE, ADC_MID_SCALE, SampleSource};

/// Time taken by one conversion
pub const CONVERSION_US: u64 = 25;

/// A sinusoid seen by one converter input, in raw counts
#[derive(Debug, Clone, Copy)]
pub struct SimulatedSignal {
    pub input: u8,
    pub offset: f64,
    pub amplitude: f64,
    /// Phase in degrees, positive leads
    pub phase: f64,
}

impl SimulatedSignal {
    pub fn new(input: u8, amplitude: f64, phase: f64) -> Self {
        Self {
            input,
            offset: ADC_MID_SCALE as f64,
            amplitude,
            phase,
        }
    }

    fn at(&self, frequency: f64, micros: u64) -> u16 {
        let t = micros as f64 / 1e6;
        let value = self.offset + self.amplitude * (2.0 * PI * frequency * t + self.phase.to_radians()).sin();
        value.round().clamp(0.0, (ADC_FULL_SCALE - 1) as f64) as u16
    }

    /// RMS of the AC part in counts, ignoring clipping
    pub fn rms_counts(&self) -> f64 {
        self.amplitude / 2f64.sqrt()
    }
}

/// Voltage and current sensors on a simulated mains.
///
/// Time only moves when converting or waiting, so runs are deterministic.
#[derive(Debug, Clone)]
pub struct SimulatedMains {
    pub frequency: f64,
    pub voltage: SimulatedSignal,
    pub current: SimulatedSignal,
    micros: u64,
    conversions: u64,
}

impl Default for SimulatedMains {
    /// 50Hz, ~1000 counts of voltage and 300 counts of current in phase
    fn default() -> Self {
        Self::new(
            50.0,
            SimulatedSignal::new(0, 1000.0, 0.0),
            SimulatedSignal::new(1, 300.0, 0.0),
        )
    }
}

impl SimulatedMains {
    pub fn new(frequency: f64, voltage: SimulatedSignal, current: SimulatedSignal) -> Self {
        Self {
            frequency,
            voltage,
            current,
            micros: 0,
            conversions: 0,
        }
    }

    pub fn micros(&self) -> u64 {
        self.micros
    }

    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    /// Moves the clock forward without converting
    pub fn advance(&mut self, micros: u64) {
        self.micros += micros;
    }
}

impl SampleSource for SimulatedMains {
    fn read_raw(&mut self, input: u8) -> u16 {
        let value = if input == self.voltage.input {
            self.voltage.at(self.frequency, self.micros)
        } else if input == self.current.input {
            self.current.at(self.frequency, self.micros)
        } else {
            ADC_MID_SCALE
        };
        self.micros += CONVERSION_US;
        self.conversions += 1;
        value
    }

    fn elapsed_millis(&self) -> u32 {
        (self.micros / 1000) as u32
    }
}

impl DelayUs<u32> for SimulatedMains {
    fn delay_us(&mut self, us: u32) {
        self.micros += us as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_take_time() {
        let mut sim = SimulatedMains::default();
        sim.read_raw(0);
        sim.read_raw(1);
        sim.delay_us(950);
        assert_eq!(sim.micros(), 1000);
        assert_eq!(sim.elapsed_millis(), 1);
        assert_eq!(sim.conversions(), 2);
    }

    #[test]
    fn follows_the_sine() {
        let mut sim = SimulatedMains::default();
        assert_eq!(sim.read_raw(0), 2048);

        // Quarter period at 50Hz
        sim.advance(5000 - CONVERSION_US);
        assert_eq!(sim.read_raw(0), 3048);
        assert_eq!(sim.read_raw(1), 2348);
        assert_eq!(sim.read_raw(9), ADC_MID_SCALE);
    }

    #[test]
    fn clips_to_converter_range() {
        let mut sim = SimulatedMains::new(
            50.0,
            SimulatedSignal::new(0, 5000.0, 90.0),
            SimulatedSignal::new(1, 5000.0, -90.0),
        );
        assert_eq!(sim.read_raw(0), 4095);
        assert_eq!(sim.read_raw(1), 0);
    }
}
