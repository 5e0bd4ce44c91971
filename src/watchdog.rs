use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Task watchdog guarding the measurement loop. A cycle that hangs (e.g. a stuck
/// converter) must reboot the device instead of freezing the readings.
#[cfg_attr(test, automock)]
pub trait Watchdog {
    fn init(&self, timeout: Duration);
    fn reset(&self);
    fn stop(&self);
}
