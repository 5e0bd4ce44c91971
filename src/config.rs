use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adc::SampleSource;
use crate::calibration::CalibrationProfile;
use crate::energy_monitor::EnergyMonitor;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("calibration factor `{name}` must be positive, got {value}")]
    InvalidCalibration { name: &'static str, value: f32 },
    #[error("crossing target must be greater than zero")]
    NoCrossings,
    #[error("voltage and current sensors share input {0}")]
    SharedInput(u8),
}

/// Monitor settings, stored as a JSON document.
///
/// Missing fields take their defaults, so older documents keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub voltage_input: u8,
    pub current_input: u8,
    pub calibration: CalibrationProfile,
    /// Positive crossings (full mains cycles) per measurement
    pub crossings: u32,
    pub timeout_ms: u32,
    /// Wait between measurements
    pub period_ms: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            voltage_input: 0,
            current_input: 1,
            calibration: Default::default(),
            crossings: 20,
            timeout_ms: 2000,
            period_ms: 5000,
        }
    }
}

impl MonitorConfig {
    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, anyhow::Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_calibration(&self.calibration)?;
        if self.crossings == 0 {
            return Err(ConfigError::NoCrossings);
        }
        if self.voltage_input == self.current_input {
            return Err(ConfigError::SharedInput(self.voltage_input));
        }
        Ok(())
    }

    /// Configures inputs and calibration of a monitor
    pub fn apply<S: SampleSource>(&self, monitor: &mut EnergyMonitor<S>) {
        let cal = &self.calibration;
        monitor.voltage(self.voltage_input, cal.voltage, cal.phase);
        monitor.current(self.current_input, cal.current);
    }
}

/// Every factor must be finite and positive
pub fn validate_calibration(cal: &CalibrationProfile) -> Result<(), ConfigError> {
    for (name, value) in [
        ("voltage", cal.voltage),
        ("current", cal.current),
        ("phase", cal.phase),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::InvalidCalibration { name, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.crossings, 20);
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.calibration.voltage, 250.0);
        assert_eq!(config.calibration.current, 30.0);
        assert_eq!(config.calibration.phase, 1.12);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config =
            MonitorConfig::from_json(r#"{"current_input": 4, "calibration": {"current": 60.0}}"#)
                .unwrap();
        assert_eq!(config.current_input, 4);
        assert_eq!(config.calibration.current, 60.0);
        assert_eq!(config.calibration.voltage, 250.0);
        assert_eq!(config.period_ms, 5000);
    }

    #[test]
    fn survives_json() {
        let config = MonitorConfig {
            voltage_input: 2,
            crossings: 10,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(MonitorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_invalid_documents() {
        assert!(MonitorConfig::from_json("not json").is_err());
        assert!(MonitorConfig::from_json(r#"{"crossings": 0}"#).is_err());
        assert!(MonitorConfig::from_json(r#"{"current_input": 0}"#).is_err());
    }

    #[test]
    fn rejects_bad_calibration() {
        let mut config = MonitorConfig::default();
        config.calibration.phase = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCalibration {
                name: "phase",
                value: 0.0
            })
        );

        config.calibration.phase = 1.0;
        config.calibration.voltage = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCalibration { name: "voltage", .. })
        ));
    }
}
