//! Reduced precision trace of the filtered waveforms, for diagnostics.

pub const WAVEFORM_CAPACITY: usize = 128;

/// Maps a filtered value into one byte: `(value + offset) / divisor`, saturating at both ends.
///
/// The divisors must fit the expected signal amplitude, anything outside is clipped.
#[derive(Debug, Clone, Copy)]
pub struct Compression {
    pub offset: f32,
    pub divisor: f32,
}

impl Compression {
    pub const VOLTAGE: Self = Self {
        offset: 2048.0,
        divisor: 16.0,
    };
    pub const CURRENT: Self = Self {
        offset: 1024.0,
        divisor: 8.0,
    };

    pub fn compress(&self, filtered: f32) -> u8 {
        let scaled = (filtered + self.offset) / self.divisor;
        if scaled.is_nan() {
            return 0;
        }
        scaled.clamp(0.0, u8::MAX as f32) as u8
    }
}

/// Circular buffer holding the last `N` compressed voltage/current pairs.
///
/// Slots are indexed by sample number, so after a cycle the oldest entry is at
/// `sample_count % N`. The contents survive between cycles until overwritten.
#[derive(Debug, Clone)]
pub struct WaveformBuffer<const N: usize = WAVEFORM_CAPACITY> {
    voltage: [u8; N],
    current: [u8; N],
}

impl<const N: usize> Default for WaveformBuffer<N> {
    fn default() -> Self {
        Self {
            voltage: [0; N],
            current: [0; N],
        }
    }
}

impl<const N: usize> WaveformBuffer<N> {
    pub fn record(&mut self, sample_number: usize, filtered_v: f32, filtered_i: f32) {
        let slot = sample_number % N;
        self.voltage[slot] = Compression::VOLTAGE.compress(filtered_v);
        self.current[slot] = Compression::CURRENT.compress(filtered_i);
    }

    pub fn voltage(&self) -> &[u8; N] {
        &self.voltage
    }

    pub fn current(&self) -> &[u8; N] {
        &self.current
    }

    /// Stored `(voltage, current)` pairs, oldest first.
    ///
    /// `sample_count` is the number of samples written so far in the cycle. With
    /// fewer than `N` samples only those are returned.
    pub fn ordered(&self, sample_count: usize) -> impl Iterator<Item = (u8, u8)> + '_ {
        let (start, len) = if sample_count >= N {
            (sample_count % N, N)
        } else {
            (0, sample_count)
        };
        (0..len).map(move |i| {
            let slot = (start + i) % N;
            (self.voltage[slot], self.current[slot])
        })
    }
}
