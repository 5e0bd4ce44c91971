use esp_idf_sys::*;

use crate::watchdog::Watchdog;

/// Task watchdog subscribed by the measuring task. Panics (and reboots) on expiry.
pub struct EspWatchdog;

impl Watchdog for EspWatchdog {
    fn init(&self, timeout: std::time::Duration) {
        log::info!("Arming task watchdog ({} ms)", timeout.as_millis());
        let config = esp_task_wdt_config_t {
            timeout_ms: timeout.as_millis() as u32,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // The default watchdog may already be running, reconfigure it in that case.
        // Re-arming with a new timeout finds this task already subscribed.
        let result = esp!(unsafe { esp_task_wdt_init(&config) })
            .or_else(|_| esp!(unsafe { esp_task_wdt_reconfigure(&config) }))
            .and_then(|_| match unsafe { esp_task_wdt_status(std::ptr::null_mut()) } {
                ESP_OK => Ok(()),
                _ => esp!(unsafe { esp_task_wdt_add(std::ptr::null_mut()) }),
            });
        if let Err(e) = result {
            log::error!("Could not arm watchdog: {e}");
        }
    }

    fn reset(&self) {
        unsafe { esp_task_wdt_reset() };
    }

    fn stop(&self) {
        log::info!("Disarming task watchdog");
        unsafe {
            esp_task_wdt_delete(std::ptr::null_mut());
        };
    }
}
