use embedded_hal::blocking::delay::DelayUs;
use esp_idf_hal::delay::Ets;
use esp_idf_sys::*;

use crate::adc::{ADC_MID_SCALE, SampleSource};

/// One-shot conversions on ADC1, one raw read per call.
///
/// Inputs are ADC1 channel numbers (channel 0 is GPIO0 on the ESP32-C3).
pub struct EspAdcSource {
    handle: adc_oneshot_unit_handle_t,
    last: [u16; 8],
}

impl EspAdcSource {
    pub fn new(channels: &[u8]) -> Result<Self, EspError> {
        log::info!("Initializing ADC1 on channels {channels:?}");
        let mut handle: adc_oneshot_unit_handle_t = std::ptr::null_mut();
        let unit_config = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ..Default::default()
        };
        esp!(unsafe { adc_oneshot_new_unit(&unit_config, &mut handle) })?;

        let channel_config = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_11,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
            ..Default::default()
        };
        for &channel in channels {
            esp!(unsafe { adc_oneshot_config_channel(handle, channel as adc_channel_t, &channel_config) })?;
        }

        Ok(Self {
            handle,
            last: [ADC_MID_SCALE; 8],
        })
    }
}

impl Drop for EspAdcSource {
    fn drop(&mut self) {
        esp!(unsafe { adc_oneshot_del_unit(self.handle) }).expect("Failure releasing ADC1");
    }
}

impl SampleSource for EspAdcSource {
    fn read_raw(&mut self, input: u8) -> u16 {
        let slot = input as usize % self.last.len();
        let mut raw: i32 = 0;
        match esp!(unsafe { adc_oneshot_read(self.handle, input as adc_channel_t, &mut raw) }) {
            Ok(()) => self.last[slot] = raw as u16,
            // Keep the previous value, a spike to 0 would disturb the filters for seconds
            Err(e) => log::warn!("ADC read on channel {input} failed: {e}"),
        }
        self.last[slot]
    }

    fn elapsed_millis(&self) -> u32 {
        (unsafe { esp_timer_get_time() } / 1000) as u32
    }
}

impl DelayUs<u32> for EspAdcSource {
    fn delay_us(&mut self, us: u32) {
        Ets::delay_us(us);
    }
}
