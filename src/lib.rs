use serde::Serialize;
use std::{
    fmt::Display,
    sync::{Arc, Mutex, mpsc},
    thread::sleep,
    time::Duration,
};

use adc::SampleSource;
use calibration::{CalibrationProfile, Measurement};
use config::{MonitorConfig, validate_calibration};
use energy_monitor::EnergyMonitor;
use watchdog::Watchdog;

pub mod adc;
pub mod calibration;
pub mod config;
pub mod console;
mod current_meter;
pub mod energy_monitor;
pub mod filter;
pub mod logger;
pub mod sim;
pub mod sync;
pub mod watchdog;
pub mod waveform;

#[cfg(target_arch = "riscv32")]
pub mod driver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    SetCalibration(CalibrationProfile),
    SetCycle { crossings: u32, timeout_ms: u32 },
    Shutdown,
}

#[derive(PartialEq, Debug, Copy, Clone, Default, Serialize)]
pub enum MonitorState {
    #[default]
    Starting,
    Measuring,
    /// Last cycle timed out or produced no reading
    Degraded,
    Shutdown,
}

impl Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{self:?}"))
    }
}

#[derive(Clone, Default, Serialize)]
pub struct MonitorStatus {
    pub reading: Option<Measurement>,
    pub state: MonitorState,
    pub cycles: u32,
    pub failed_cycles: u32,
}

/// Runs measurement cycles on a fixed period.
///
/// Calibration changes arrive through the control channel and are applied between
/// cycles, never while one is running.
pub struct MonitorController<S, W>
where
    S: SampleSource,
    W: Watchdog,
{
    monitor: EnergyMonitor<S>,
    watchdog: W,
    config: MonitorConfig,
    state: MonitorState,

    status: Arc<Mutex<MonitorStatus>>,

    control_tx: mpsc::Sender<ControlMessage>,
    control_rx: mpsc::Receiver<ControlMessage>,
}

impl<S, W> MonitorController<S, W>
where
    S: SampleSource,
    W: Watchdog,
{
    pub fn new(mut monitor: EnergyMonitor<S>, watchdog: W, config: MonitorConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        config.apply(&mut monitor);

        Self {
            monitor,
            watchdog,
            config,
            state: MonitorState::Starting,
            status: Default::default(),
            control_tx: tx,
            control_rx: rx,
        }
    }

    pub fn status(&self) -> Arc<Mutex<MonitorStatus>> {
        self.status.clone()
    }

    pub fn control_channel(&self) -> mpsc::Sender<ControlMessage> {
        self.control_tx.clone()
    }

    pub fn monitor(&self) -> &EnergyMonitor<S> {
        &self.monitor
    }

    /// Worst case duration of one step: synchronization and measurement can each take
    /// the whole timeout, plus the wait between cycles
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(2 * self.config.timeout_ms as u64 + self.config.period_ms as u64)
            + Duration::from_secs(1)
    }

    /// Runs cycles until a shutdown message arrives
    pub fn run(&mut self) {
        self.watchdog.init(self.watchdog_timeout());
        while self.run_once() != MonitorState::Shutdown {
            sleep(Duration::from_millis(self.config.period_ms as u64));
        }
    }

    /// Applies pending control messages and runs one measurement cycle
    pub fn run_once(&mut self) -> MonitorState {
        self.watchdog.reset();

        let prev_state = self.state;
        while let Ok(msg) = self.control_rx.try_recv() {
            match msg {
                ControlMessage::SetCalibration(calibration) => {
                    if let Err(e) = validate_calibration(&calibration) {
                        log::warn!("Ignoring calibration {calibration:?}: {e}");
                        continue;
                    }
                    log::info!("Setting calibration to {calibration:?}");
                    self.config.calibration = calibration;
                    self.monitor.set_calibration(calibration);
                }
                ControlMessage::SetCycle {
                    crossings,
                    timeout_ms,
                } => {
                    log::info!("Setting cycle to {crossings} crossings / {timeout_ms} ms");
                    self.config.crossings = crossings;
                    self.config.timeout_ms = timeout_ms;
                    // A longer cycle must not outlast the armed watchdog
                    self.watchdog.init(self.watchdog_timeout());
                }
                ControlMessage::Shutdown => self.state = MonitorState::Shutdown,
            }
        }

        if self.state != MonitorState::Shutdown {
            let result = self
                .monitor
                .calc_vi(self.config.crossings, self.config.timeout_ms);

            let mut status = self.status.lock().unwrap();
            status.cycles += 1;
            match result {
                Ok(reading) => {
                    self.state = if reading.timed_out {
                        MonitorState::Degraded
                    } else {
                        MonitorState::Measuring
                    };
                    status.reading = Some(reading);
                }
                Err(e) => {
                    log::error!("Measurement cycle failed: {e}");
                    self.state = MonitorState::Degraded;
                    status.failed_cycles += 1;
                    status.reading = None;
                }
            }
        }

        if prev_state != self.state {
            log::info!("State transition {:?} => {:?}", prev_state, self.state);
            if self.state == MonitorState::Shutdown {
                self.watchdog.stop();
            }
            self.status.lock().unwrap().state = self.state;
        }

        self.state
    }
}
