//! Serial console commands for the controller
//!
//! ```text
//! cal <vcal> <ical> <phasecal>
//! cycle <crossings> <timeout_ms>
//! stop
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::calibration::CalibrationProfile;
use crate::ControlMessage;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

const CAL_USAGE: &str = "cal <vcal> <ical> <phasecal>";
const CYCLE_USAGE: &str = "cycle <crossings> <timeout_ms>";

pub fn parse_command(line: &str) -> Result<ControlMessage, CommandError> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or(CommandError::Empty)?;
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("cal", [voltage, current, phase]) => {
            Ok(ControlMessage::SetCalibration(CalibrationProfile {
                voltage: number(voltage)?,
                current: number(current)?,
                phase: number(phase)?,
            }))
        }
        ("cal", _) => Err(CommandError::Usage(CAL_USAGE)),
        ("cycle", [crossings, timeout_ms]) => Ok(ControlMessage::SetCycle {
            crossings: number(crossings)?,
            timeout_ms: number(timeout_ms)?,
        }),
        ("cycle", _) => Err(CommandError::Usage(CYCLE_USAGE)),
        ("stop", []) => Ok(ControlMessage::Shutdown),
        ("stop", _) => Err(CommandError::Usage("stop")),
        (other, _) => Err(CommandError::Unknown(other.into())),
    }
}

fn number<T: FromStr>(word: &str) -> Result<T, CommandError> {
    word.parse()
        .map_err(|_| CommandError::InvalidNumber(word.into()))
}
