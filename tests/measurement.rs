use embedded_hal::blocking::delay::DelayUs;

use emonvi::adc::{ADC_MID_SCALE, SampleSource};
use emonvi::calibration::{CalibrationProfile, MeasurementError};
use emonvi::energy_monitor::EnergyMonitor;
use emonvi::filter::{HIGH_PASS_COEFFICIENT, HighPassFilter};
use emonvi::sim::{SimulatedMains, SimulatedSignal};
use emonvi::sync::SyncOutcome;
use emonvi::waveform::{Compression, WAVEFORM_CAPACITY};

const VCAL: f32 = 250.0;
const ICAL: f32 = 30.0;

fn ratio(cal: f32) -> f64 {
    cal as f64 * 3.3 / 4096.0
}

fn assert_close(actual: f32, expected: f64, tolerance: f64) {
    let error = (actual as f64 - expected).abs() / expected.abs();
    assert!(
        error < tolerance,
        "{actual} differs from {expected} by {:.3}%",
        error * 100.0
    );
}

fn monitor(source: SimulatedMains, phase_cal: f32) -> EnergyMonitor<SimulatedMains> {
    let (v_input, i_input) = (source.voltage.input, source.current.input);
    let mut monitor = EnergyMonitor::new(source);
    monitor.voltage(v_input, VCAL, phase_cal);
    monitor.current(i_input, ICAL);
    monitor
}

/// Runs cycles until the start-up transient of the filters is gone
fn warm_up<S: SampleSource>(monitor: &mut EnergyMonitor<S>) {
    for _ in 0..3 {
        let _ = monitor.calc_vi(20, 2000);
    }
}

#[test]
fn converges_to_sine_rms() {
    let mut monitor = monitor(SimulatedMains::default(), 1.0);
    warm_up(&mut monitor);

    let reading = monitor.calc_vi(20, 2000).unwrap();

    let vrms = ratio(VCAL) * 1000.0 / 2f64.sqrt();
    let irms = ratio(ICAL) * 300.0 / 2f64.sqrt();
    assert_close(reading.vrms, vrms, 0.02);
    assert_close(reading.irms, irms, 0.02);
    assert_close(reading.real_power, vrms * irms, 0.02);
    assert_close(reading.apparent_power, vrms * irms, 0.02);
    assert_close(reading.power_factor.unwrap(), 1.0, 0.01);
    assert_eq!(monitor.last_sync(), Some(SyncOutcome::Synchronized));
}

#[test]
fn lagging_current_lowers_power_factor() {
    let source = SimulatedMains::new(
        50.0,
        SimulatedSignal::new(0, 1000.0, 0.0),
        SimulatedSignal::new(1, 300.0, -60.0),
    );
    let mut monitor = monitor(source, 1.0);
    warm_up(&mut monitor);

    let reading = monitor.calc_vi(20, 2000).unwrap();
    let pf = reading.power_factor.unwrap();
    assert!((pf - 0.5).abs() < 0.03, "power factor {pf}");
    assert!(reading.real_power < reading.apparent_power);
}

#[test]
fn stops_at_crossing_target() {
    let mut monitor = monitor(SimulatedMains::default(), 1.0);

    for target in [1, 5, 20] {
        let reading = monitor.calc_vi(target, 2000).unwrap();
        assert_eq!(reading.crossings, target);
        assert_eq!(monitor.crossing_count(), target);
        assert!(!reading.timed_out);
        assert_eq!(monitor.sample_count(), reading.samples);
    }
}

#[test]
fn timeout_keeps_partial_window() {
    let mut monitor = monitor(SimulatedMains::default(), 1.0);
    warm_up(&mut monitor);

    // 30ms fit one and a half mains cycles at 50Hz
    let reading = monitor.calc_vi(20, 30).unwrap();
    assert!(reading.timed_out);
    assert!(reading.crossings < 20);
    assert!(reading.samples > 0);
    // One pair every 300us (two conversions and the fixed delay), the clock has 1ms resolution
    assert!((96..=100).contains(&reading.samples), "{} samples", reading.samples);
    assert_close(reading.vrms, ratio(VCAL) * 1000.0 / 2f64.sqrt(), 0.1);
}

#[test]
fn zero_timeout_is_degenerate() {
    let mut monitor = monitor(SimulatedMains::default(), 1.0);
    let conversions = monitor.source().conversions();

    assert_eq!(monitor.calc_vi(20, 0), Err(MeasurementError::NoSamples));
    assert_eq!(monitor.sample_count(), 0);
    assert_eq!(monitor.source().conversions(), conversions);

    // Next cycle is unaffected
    assert!(monitor.calc_vi(20, 2000).is_ok());
}

#[test]
fn consecutive_cycles_do_not_leak_sums() {
    let mut monitor = monitor(SimulatedMains::default(), 1.0);
    warm_up(&mut monitor);

    let first = monitor.calc_vi(20, 2000).unwrap();
    let second = monitor.calc_vi(20, 2000).unwrap();

    assert_close(second.vrms, first.vrms as f64, 0.005);
    assert_close(second.irms, first.irms as f64, 0.005);
    assert_close(second.real_power, first.real_power as f64, 0.005);
}

#[test]
fn no_voltage_sensor_still_measures() {
    // Voltage input reads a flat mid-scale: no crossings at all
    let source = SimulatedMains::new(
        50.0,
        SimulatedSignal::new(0, 0.0, 0.0),
        SimulatedSignal::new(1, 300.0, 0.0),
    );
    let mut monitor = monitor(source, 1.0);

    let reading = monitor.calc_vi(20, 100).unwrap();
    assert_eq!(monitor.last_sync(), Some(SyncOutcome::NoRisingEdge));
    assert!(reading.timed_out);
    assert_eq!(reading.crossings, 0);
    assert!(reading.samples > 0);
}

#[test]
fn no_current_has_no_power_factor() {
    let source = SimulatedMains::new(
        50.0,
        SimulatedSignal::new(0, 1000.0, 0.0),
        SimulatedSignal::new(1, 0.0, 0.0),
    );
    let mut monitor = monitor(source, 1.0);
    warm_up(&mut monitor);

    // A flat current input still carries the start-up step, let the filter decay it
    monitor.calc_irms(40000).unwrap();
    let reading = monitor.calc_vi(20, 2000).unwrap();
    assert!(reading.vrms > 100.0);
    assert_eq!(reading.irms, 0.0);
    assert_eq!(reading.apparent_power, 0.0);
    assert_eq!(reading.power_factor, None);
    assert_eq!(reading.to_string().split(' ').last(), Some("nan"));
}

#[test]
fn current_only_rms() {
    let mut monitor = monitor(SimulatedMains::default(), 1.0);
    monitor.calc_irms(3000).unwrap();

    let irms = monitor.calc_irms(3000).unwrap();
    assert_close(irms, ratio(ICAL) * 300.0 / 2f64.sqrt(), 0.02);
    assert_eq!(monitor.calc_irms(0), Err(MeasurementError::NoSamples));
}

/// Feeds one sine period of 4 samples, moving on to the next sample after each pair
struct FourSampleSine {
    index: usize,
    micros: u32,
}

const V_TABLE: [u16; 4] = [ADC_MID_SCALE, ADC_MID_SCALE + 1000, ADC_MID_SCALE, ADC_MID_SCALE - 1000];
const I_TABLE: [u16; 4] = [ADC_MID_SCALE, ADC_MID_SCALE + 300, ADC_MID_SCALE, ADC_MID_SCALE - 300];

impl SampleSource for FourSampleSine {
    fn read_raw(&mut self, input: u8) -> u16 {
        self.micros += 10;
        match input {
            0 => V_TABLE[self.index % 4],
            _ => I_TABLE[self.index % 4],
        }
    }

    fn elapsed_millis(&self) -> u32 {
        self.micros / 1000
    }
}

impl DelayUs<u32> for FourSampleSine {
    fn delay_us(&mut self, us: u32) {
        self.micros += us;
        self.index += 1;
    }
}

#[test]
fn four_sample_sine_matches_closed_form() {
    let mut monitor = four_sample_monitor();
    // Every cycle ends on a rising edge, so the next window starts right after it
    for _ in 0..40 {
        monitor.calc_vi(50, 200).unwrap();
    }

    let reading = monitor.calc_vi(50, 200).unwrap();

    // Filter gain at a quarter of the sampling rate: |k (1 + j) / (1 + jk)|
    let k = HIGH_PASS_COEFFICIENT as f64;
    let gain = k * 2f64.sqrt() / (1.0 + k * k).sqrt();
    // The sampled sine is 0, A, 0, -A: mean square A^2 / 2
    let vrms = ratio(VCAL) * gain * 1000.0 / 2f64.sqrt();
    let irms = ratio(ICAL) * gain * 300.0 / 2f64.sqrt();
    let real_power = ratio(VCAL) * ratio(ICAL) * gain * gain * 1000.0 * 300.0 / 2.0;

    assert_eq!(reading.crossings, 50);
    assert_eq!(reading.samples, 4 * 50);
    assert_close(reading.vrms, vrms, 1e-4);
    assert_close(reading.irms, irms, 1e-4);
    assert_close(reading.real_power, real_power, 1e-4);
    assert_close(reading.apparent_power, vrms * irms, 1e-4);
    assert_close(reading.power_factor.unwrap(), 1.0, 1e-4);
}

fn four_sample_monitor() -> EnergyMonitor<FourSampleSine> {
    let mut monitor = EnergyMonitor::new(FourSampleSine { index: 0, micros: 0 });
    monitor.set_calibration(CalibrationProfile {
        voltage: VCAL,
        current: ICAL,
        phase: 1.0,
    });
    monitor
}

#[test]
fn identical_inputs_give_identical_readings() {
    let mut first = four_sample_monitor();
    let mut second = four_sample_monitor();

    for _ in 0..40 {
        assert_eq!(first.calc_vi(50, 200), second.calc_vi(50, 200));
    }

    // Steady state: one window of the same periodic input gives the next one's reading
    let a = first.calc_vi(50, 200).unwrap();
    let b = first.calc_vi(50, 200).unwrap();
    assert_eq!((a.samples, a.crossings, a.timed_out), (b.samples, b.crossings, b.timed_out));
    assert_close(b.vrms, a.vrms as f64, 1e-5);
    assert_close(b.irms, a.irms as f64, 1e-5);
    assert_close(b.real_power, a.real_power as f64, 1e-5);
    assert_close(b.apparent_power, a.apparent_power as f64, 1e-5);
}

/// Passes everything through, remembering each voltage/current pair
struct Tap {
    inner: SimulatedMains,
    pending: Vec<u16>,
    pairs: Vec<(u16, u16)>,
}

impl SampleSource for Tap {
    fn read_raw(&mut self, input: u8) -> u16 {
        let value = self.inner.read_raw(input);
        self.pending.push(value);
        value
    }

    fn elapsed_millis(&self) -> u32 {
        self.inner.elapsed_millis()
    }
}

impl DelayUs<u32> for Tap {
    fn delay_us(&mut self, us: u32) {
        let n = self.pending.len();
        self.pairs.push((self.pending[n - 2], self.pending[n - 1]));
        self.pending.clear();
        self.inner.delay_us(us);
    }
}

#[test]
fn waveform_holds_last_samples_in_order() {
    // Current large enough to clip the compressed trace
    let inner = SimulatedMains::new(
        50.0,
        SimulatedSignal::new(0, 1000.0, 0.0),
        SimulatedSignal::new(1, 1500.0, 0.0),
    );
    let tap = Tap {
        inner,
        pending: vec![],
        pairs: vec![],
    };
    let mut monitor = EnergyMonitor::new(tap);
    monitor.calc_vi(5, 2000).unwrap();
    let samples = monitor.sample_count() as usize;
    assert!(samples > WAVEFORM_CAPACITY);

    // Replay every pair (synchronization included) through fresh filters
    let mut voltage = HighPassFilter::default();
    let mut current = HighPassFilter::default();
    let compressed: Vec<(u8, u8)> = monitor
        .source()
        .pairs
        .iter()
        .map(|&(v, i)| {
            (
                Compression::VOLTAGE.compress(voltage.update(v)),
                Compression::CURRENT.compress(current.update(i)),
            )
        })
        .collect();
    let expected = &compressed[compressed.len() - WAVEFORM_CAPACITY..];

    let stored: Vec<(u8, u8)> = monitor.waveform().ordered(samples).collect();
    assert_eq!(stored, expected);
    assert!(stored.iter().any(|&(_, i)| i == u8::MAX));
    assert!(stored.iter().any(|&(_, i)| i == 0));
}
