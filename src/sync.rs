//! Alignment of the measurement window to a positive zero crossing of the voltage

use serde::Serialize;

use crate::adc::{ADC_MID_SCALE, AdcChannel, SampleSource};
use crate::energy_monitor::EnergyMonitor;

/// Half width of the raw band around mid-scale considered "near zero"
pub const NEAR_ZERO_BAND: u16 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncStage {
    /// Polling raw voltage until it is close to mid-scale. The filters are not
    /// touched yet.
    SeekingNearZero,
    /// Sampling at the normal rate until filtered voltage turns non-negative
    AwaitingRisingEdge,
}

/// Outcome of synchronization. Anything but `Synchronized` only costs accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    Synchronized,
    /// Raw voltage never came near mid-scale (no voltage sensor?)
    NoNearZero,
    NoRisingEdge,
}

pub fn is_near_zero(raw: u16) -> bool {
    raw.abs_diff(ADC_MID_SCALE) < NEAR_ZERO_BAND
}

impl<S: SampleSource> EnergyMonitor<S> {
    /// Waits for a positive zero crossing. Both stages share one `timeout_ms` budget.
    pub(crate) fn synchronize(&mut self, timeout_ms: u32) -> SyncOutcome {
        let start = self.source.elapsed_millis();
        let mut stage = SyncStage::SeekingNearZero;
        let voltage_input = self.input(AdcChannel::Voltage);

        loop {
            if self.source.elapsed_millis().wrapping_sub(start) >= timeout_ms {
                return match stage {
                    SyncStage::SeekingNearZero => SyncOutcome::NoNearZero,
                    SyncStage::AwaitingRisingEdge => SyncOutcome::NoRisingEdge,
                };
            }

            match stage {
                SyncStage::SeekingNearZero => {
                    if is_near_zero(self.source.read_raw(voltage_input)) {
                        stage = SyncStage::AwaitingRisingEdge;
                    }
                }
                SyncStage::AwaitingRisingEdge => {
                    self.sample_pair();
                    if self.voltage.rising_edge() {
                        return SyncOutcome::Synchronized;
                    }
                }
            }
        }
    }
}
