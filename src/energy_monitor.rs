//! Voltage/current sampling engine
//!
//! Sums squared voltage, squared current and instantaneous power over a whole number of
//! mains cycles, starting on a positive zero crossing of the voltage.

use enum_map::{enum_map, EnumMap};

use crate::adc::{AdcChannel, SampleSource};
use crate::calibration::{Accumulator, CalibrationProfile, Measurement, MeasurementError};
use crate::filter::HighPassFilter;
use crate::sync::SyncOutcome;
use crate::waveform::WaveformBuffer;

/// Busy-wait after reading each voltage/current pair. The phase calibration is tuned
/// against this spacing, changing it invalidates every PHASECAL in use.
pub const SAMPLE_PAIR_DELAY_US: u32 = 250;

/// Counters and sums of the cycle in progress
#[derive(Debug, Default, Clone, Copy)]
pub struct MeasurementWindow {
    pub crossings: u32,
    pub samples: u32,
    pub sums: Accumulator,
}

/// Single phase energy monitor.
///
/// Filter history and the waveform trace carry over between cycles, the window is
/// restarted every cycle. Not reentrant: a cycle holds `&mut self` until it finishes.
pub struct EnergyMonitor<S: SampleSource> {
    pub(crate) source: S,
    inputs: EnumMap<AdcChannel, u8>,
    calibration: CalibrationProfile,
    pub(crate) voltage: HighPassFilter,
    pub(crate) current: HighPassFilter,
    pub(crate) window: MeasurementWindow,
    waveform: WaveformBuffer,
    last_sync: Option<SyncOutcome>,
}

impl<S: SampleSource> EnergyMonitor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            inputs: enum_map! {
                AdcChannel::Voltage => 0,
                AdcChannel::Current => 1,
            },
            calibration: Default::default(),
            voltage: Default::default(),
            current: Default::default(),
            window: Default::default(),
            waveform: Default::default(),
            last_sync: None,
        }
    }

    /// Sets the voltage sensor input and its calibration
    pub fn voltage(&mut self, input: u8, cal: f32, phase_cal: f32) {
        self.inputs[AdcChannel::Voltage] = input;
        self.calibration.voltage = cal;
        self.calibration.phase = phase_cal;
    }

    /// Sets the current sensor input and its calibration
    pub fn current(&mut self, input: u8, cal: f32) {
        self.inputs[AdcChannel::Current] = input;
        self.calibration.current = cal;
    }

    pub fn set_calibration(&mut self, calibration: CalibrationProfile) {
        self.calibration = calibration;
    }

    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }

    pub fn input(&self, channel: AdcChannel) -> u8 {
        self.inputs[channel]
    }

    /// Samples taken in the last cycle
    pub fn sample_count(&self) -> u32 {
        self.window.samples
    }

    /// Positive voltage crossings counted in the last cycle
    pub fn crossing_count(&self) -> u32 {
        self.window.crossings
    }

    pub fn waveform(&self) -> &WaveformBuffer {
        &self.waveform
    }

    /// How the last cycle started, `None` before the first one
    pub fn last_sync(&self) -> Option<SyncOutcome> {
        self.last_sync
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Runs a full measurement cycle. Blocks for up to twice `timeout_ms`: once
    /// synchronizing and once measuring.
    ///
    /// Ends after `crossings` positive zero crossings (full mains cycles) or on timeout,
    /// whichever comes first.
    pub fn calc_vi(&mut self, crossings: u32, timeout_ms: u32) -> Result<Measurement, MeasurementError> {
        self.window.crossings = 0;
        self.window.samples = 0;

        let sync = self.synchronize(timeout_ms);
        if sync != SyncOutcome::Synchronized {
            log::debug!("Starting measurement without zero crossing: {sync:?}");
        }
        self.last_sync = Some(sync);

        let start = self.source.elapsed_millis();
        while self.window.crossings < crossings
            && self.source.elapsed_millis().wrapping_sub(start) < timeout_ms
        {
            self.sample_pair();
            let filtered_v = self.voltage.filtered();
            let filtered_i = self.current.filtered();

            self.waveform
                .record(self.window.samples as usize, filtered_v, filtered_i);

            let sums = &mut self.window.sums;
            sums.sum_v += filtered_v * filtered_v;
            sums.sum_i += filtered_i * filtered_i;

            let shifted_v = self
                .calibration
                .phase_shift(self.voltage.last_filtered(), filtered_v);
            sums.sum_p += shifted_v * filtered_i;

            if self.voltage.rising_edge() {
                self.window.crossings += 1;
            }
            self.window.samples += 1;
        }

        let sums = std::mem::take(&mut self.window.sums);
        let timed_out = self.window.crossings < crossings;
        if timed_out {
            log::warn!(
                "Measurement timed out after {} of {} crossings ({} samples)",
                self.window.crossings,
                crossings,
                self.window.samples
            );
        }

        let measurement = Measurement::scale(&self.calibration, &sums, self.window.samples)
            .inspect_err(|e| log::warn!("Discarding measurement: {e}"))?;
        log::debug!(
            "{} samples, {} crossings: {}",
            self.window.samples,
            self.window.crossings,
            measurement
        );

        Ok(Measurement {
            crossings: self.window.crossings,
            timed_out,
            ..measurement
        })
    }

    /// Reads voltage then current, waits, and feeds both filters
    pub(crate) fn sample_pair(&mut self) {
        let v = self.source.read_raw(self.inputs[AdcChannel::Voltage]);
        let i = self.source.read_raw(self.inputs[AdcChannel::Current]);
        self.source.delay_us(SAMPLE_PAIR_DELAY_US);

        self.voltage.update(v);
        self.current.update(i);
    }
}
