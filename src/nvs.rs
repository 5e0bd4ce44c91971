use emonvi::config::MonitorConfig;
use esp_idf_svc::nvs::{EspDefaultNvs, EspDefaultNvsPartition};
use esp_idf_sys::EspError;

const NAMESPACE: &str = "emonvi";
const CONFIG_KEY: &str = "config";

pub fn open() -> Result<EspDefaultNvs, EspError> {
    EspDefaultNvs::new(EspDefaultNvsPartition::take()?, NAMESPACE, true)
}

/// Reads the configuration document, `None` if it was never saved
pub fn load(nvs: &EspDefaultNvs) -> Result<Option<MonitorConfig>, anyhow::Error> {
    get_string(nvs, CONFIG_KEY)?
        .map(|json| MonitorConfig::from_json(&json))
        .transpose()
}

pub fn save(nvs: &mut EspDefaultNvs, config: &MonitorConfig) -> Result<(), anyhow::Error> {
    config.validate()?;
    nvs.set_str(CONFIG_KEY, &config.to_json()?)?;
    Ok(())
}

fn get_string(nvs: &EspDefaultNvs, key: &str) -> Result<Option<String>, anyhow::Error> {
    let len = nvs.str_len(key)?;
    if let Some(len) = len {
        let mut buf = vec![0u8; len];
        Ok(nvs.get_str(key, &mut buf)?.map(|s| s.trim_end_matches('\0').into()))
    } else {
        Ok(None)
    }
}
