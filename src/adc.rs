use embedded_hal::blocking::delay::DelayUs;
use enum_map::Enum;

#[cfg(test)]
use mockall::mock;

/// Converter range (12 bits). Scaling divides by this, not by the max reading
pub const ADC_FULL_SCALE: u16 = 4096;
pub const ADC_MID_SCALE: u16 = ADC_FULL_SCALE / 2;

/// Converter reference voltage. Not measured on this board, 3.3V rail is assumed
pub const SUPPLY_MILLIVOLTS: u32 = 3300;

/// Sensor connected to a converter input
#[derive(Debug, Enum, PartialEq, Clone, Copy)]
pub enum AdcChannel {
    Voltage,
    Current,
}

/// Access to the analog inputs and the clock used to pace sampling.
///
/// The busy-wait comes from the `DelayUs` supertrait. It must really block:
/// the phase calibration constant is only meaningful for the pacing it was
/// tuned with.
pub trait SampleSource: DelayUs<u32> {
    /// Reads one raw conversion from a physical input, `0..ADC_FULL_SCALE`
    fn read_raw(&mut self, input: u8) -> u16;

    /// Monotonic milliseconds. Must not wrap during a measurement cycle
    fn elapsed_millis(&self) -> u32;
}

#[cfg(test)]
mock! {
    pub Source {}

    impl SampleSource for Source {
        fn read_raw(&mut self, input: u8) -> u16;
        fn elapsed_millis(&self) -> u32;
    }

    impl DelayUs<u32> for Source {
        fn delay_us(&mut self, us: u32);
    }
}
