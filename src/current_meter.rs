use crate::adc::{AdcChannel, SampleSource};
use crate::calibration::{MeasurementError, scale_irms};
use crate::energy_monitor::{EnergyMonitor, SAMPLE_PAIR_DELAY_US};

impl<S: SampleSource> EnergyMonitor<S> {
    /// Current only RMS over a fixed number of samples.
    ///
    /// No synchronization, so use enough samples to cover many mains cycles
    /// (e.g. 1480 samples is ~20 cycles at 50Hz). Shares the current filter history
    /// with `calc_vi`.
    pub fn calc_irms(&mut self, samples: u32) -> Result<f32, MeasurementError> {
        let input = self.input(AdcChannel::Current);

        for _ in 0..samples {
            let raw = self.source.read_raw(input);
            self.source.delay_us(SAMPLE_PAIR_DELAY_US);
            let filtered = self.current.update(raw);
            self.window.sums.sum_i += filtered * filtered;
        }

        let irms = scale_irms(self.calibration(), self.window.sums.sum_i, samples);
        self.window.sums.sum_i = 0.0;
        irms
    }
}
