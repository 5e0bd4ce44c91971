//! First order high-pass filter that removes the mid-scale bias of the sensors

/// Filter coefficient. Closer to 1 tracks offset drift slower and keeps more low frequency content
pub const HIGH_PASS_COEFFICIENT: f32 = 0.996;

/// Recursive state for one channel.
///
/// Lives as long as the monitor: resetting it between cycles would bring back the
/// start-up transient (a full mid-scale step) every time.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HighPassFilter {
    last_sample: u16,
    sample: u16,
    last_filtered: f32,
    filtered: f32,
}

impl HighPassFilter {
    /// Feeds a raw sample and returns the new filtered value
    pub fn update(&mut self, sample: u16) -> f32 {
        self.last_sample = self.sample;
        self.last_filtered = self.filtered;
        self.sample = sample;
        self.filtered = filter(self.last_filtered, self.last_sample, sample);
        self.filtered
    }

    pub fn filtered(&self) -> f32 {
        self.filtered
    }

    pub fn last_filtered(&self) -> f32 {
        self.last_filtered
    }

    pub fn sample(&self) -> u16 {
        self.sample
    }

    /// True when the output went from negative to non-negative on the last update
    pub fn rising_edge(&self) -> bool {
        self.last_filtered < 0.0 && self.filtered >= 0.0
    }
}

pub fn filter(last_filtered: f32, last_sample: u16, sample: u16) -> f32 {
    // Raw difference first: adding a mid-scale count to a tiny output rounds the decay away
    let step = sample as i32 - last_sample as i32;
    HIGH_PASS_COEFFICIENT * (last_filtered + step as f32)
}
