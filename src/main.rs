#![allow(unexpected_cfgs)]

use emonvi::calibration::Measurement;
use emonvi::config::MonitorConfig;
use emonvi::energy_monitor::EnergyMonitor;
use emonvi::logger::RingBufferLogger;

#[cfg(target_arch = "riscv32")]
mod nvs;

#[cfg(target_arch = "riscv32")]
esp_idf_sys::esp_app_desc! {}

#[cfg(target_arch = "riscv32")]
fn main() -> anyhow::Result<()> {
    use emonvi::console;
    use emonvi::{ControlMessage, MonitorController};
    use emonvi::driver::{adc::EspAdcSource, watchdog::EspWatchdog};
    use std::{thread, time::Duration};

    esp_idf_svc::sys::link_patches();

    // Initialize our in-memory logger
    let history = RingBufferLogger::init(log::LevelFilter::Info)?;
    println!("Started logger");

    // Load configuration from NVS, storing the defaults on first boot
    let mut storage = nvs::open()?;
    let config = match nvs::load(&storage) {
        Ok(Some(config)) => config,
        Ok(None) => {
            let config = MonitorConfig::default();
            nvs::save(&mut storage, &config)?;
            config
        }
        Err(e) => {
            log::warn!("Invalid stored configuration, using defaults: {e}");
            MonitorConfig::default()
        }
    };
    println!("{config:#?}");

    let source = EspAdcSource::new(&[config.voltage_input, config.current_input])?;
    let period = Duration::from_millis(config.period_ms as u64);
    let mut controller =
        MonitorController::new(EnergyMonitor::new(source), EspWatchdog, config.clone());

    // Console commands go to the controller, settings are also stored for the next boot
    let control = controller.control_channel();
    thread::spawn(move || {
        let mut config = config;
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            let msg = match console::parse_command(&line) {
                Ok(msg) => msg,
                Err(console::CommandError::Empty) => continue,
                Err(e) => {
                    log::warn!("{e}");
                    continue;
                }
            };
            match msg {
                ControlMessage::SetCalibration(calibration) => config.calibration = calibration,
                ControlMessage::SetCycle {
                    crossings,
                    timeout_ms,
                } => {
                    config.crossings = crossings;
                    config.timeout_ms = timeout_ms;
                }
                ControlMessage::Shutdown => {}
            }
            if !matches!(msg, ControlMessage::Shutdown) {
                nvs::save(&mut storage, &config)
                    .unwrap_or_else(|e| log::warn!("Not storing configuration: {e}"));
            }
            if control.send(msg).is_err() {
                break;
            }
        }
    });

    // Print every reading on the serial console
    let status = controller.status();
    thread::spawn(move || {
        loop {
            thread::sleep(period);
            let reading = status.lock().unwrap().reading;
            if let Some(reading) = reading {
                report(&reading).unwrap_or_else(|e| log::error!("Could not report reading: {e}"));
            }
        }
    });

    // Run
    controller.run();

    for line in history.lock().unwrap().iter() {
        println!("{line}");
    }
    Ok(())
}

/// Runs a few cycles against a simulated mains, optionally with a JSON configuration
#[cfg(not(target_arch = "riscv32"))]
fn main() -> anyhow::Result<()> {
    use emonvi::sim::{SimulatedMains, SimulatedSignal};

    RingBufferLogger::init(log::LevelFilter::Debug)?;

    let config = match std::env::args().nth(1) {
        Some(path) => MonitorConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => MonitorConfig::default(),
    };

    let source = SimulatedMains::new(
        50.0,
        SimulatedSignal::new(config.voltage_input, 1000.0, 0.0),
        SimulatedSignal::new(config.current_input, 300.0, -30.0),
    );
    let mut monitor = EnergyMonitor::new(source);
    config.apply(&mut monitor);

    for _ in 0..5 {
        match monitor.calc_vi(config.crossings, config.timeout_ms) {
            Ok(reading) => report(&reading)?,
            Err(e) => log::error!("Measurement failed: {e}"),
        }
    }
    Ok(())
}

/// One line in the classic `realPower apparentPower Vrms Irms powerFactor` format, then JSON
fn report(reading: &Measurement) -> anyhow::Result<()> {
    println!("{reading}");
    println!("{}", serde_json::to_string(reading)?);
    Ok(())
}
