pub mod adc;
pub mod watchdog;
