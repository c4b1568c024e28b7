//! NVS (Non-Volatile Storage) configuration store.
//!
//! Implements [`ConfigPort`]. The configuration is one `postcard` blob in
//! namespace `soilgate`, key `gwcfg`.
//!
//! - Validation: `save` refuses invalid configs; `load` rejects stored
//!   blobs that fail to decode or no longer validate.
//! - Missing key: `load` returns [`GatewayConfig::default()`].
//! - The simulation backend keeps blobs in a plain in-memory map.

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::GatewayConfig;
use crate::error::ConfigError;

#[cfg(not(target_os = "espidf"))]
use std::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

pub const CONFIG_NAMESPACE: &str = "soilgate";
pub const CONFIG_KEY: &str = "gwcfg";

const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsConfigStore {
    #[cfg(target_os = "espidf")]
    nvs: std::sync::Mutex<EspNvs<NvsDefault>>,
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<String, Vec<u8>>>,
}

fn decode(bytes: &[u8]) -> Result<GatewayConfig, ConfigError> {
    let cfg: GatewayConfig = postcard::from_bytes(bytes).map_err(|_| {
        warn!("NvsConfigStore: stored config does not decode");
        ConfigError::Corrupted
    })?;
    cfg.validate().map_err(|e| {
        warn!("NvsConfigStore: stored config rejected — {}", e);
        e
    })?;
    Ok(cfg)
}

fn encode(config: &GatewayConfig) -> Result<Vec<u8>, ConfigError> {
    config.validate()?;
    let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(ConfigError::ValidationFailed("config blob too large"));
    }
    Ok(bytes)
}

#[cfg(target_os = "espidf")]
impl NvsConfigStore {
    /// Open the `soilgate` namespace on the default partition.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NvsConfigStore: open '{}' failed — {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: ESP-IDF NVS namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self {
            nvs: std::sync::Mutex::new(nvs),
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl NvsConfigStore {
    pub fn new() -> Result<Self, ConfigError> {
        info!("NvsConfigStore: simulation backend");
        Ok(Self {
            store: RefCell::new(HashMap::new()),
        })
    }

    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Overwrite the stored blob without validation.
    pub fn write_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
    }
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<GatewayConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(&Self::composite_key()) {
                Some(bytes) => {
                    let cfg = decode(bytes)?;
                    info!("NvsConfigStore: loaded config from store");
                    Ok(cfg)
                }
                None => {
                    info!("NvsConfigStore: no stored config, using defaults");
                    Ok(GatewayConfig::default())
                }
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let nvs = self.nvs.lock().map_err(|_| ConfigError::IoError)?;
            let mut buf = [0u8; MAX_BLOB_SIZE];
            match nvs.get_blob(CONFIG_KEY, &mut buf) {
                Ok(Some(bytes)) => {
                    let cfg = decode(bytes)?;
                    info!("NvsConfigStore: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Ok(None) => {
                    info!("NvsConfigStore: no stored config, using defaults");
                    Ok(GatewayConfig::default())
                }
                Err(e) => {
                    warn!("NvsConfigStore: NVS read error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }

    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        let bytes = encode(config)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(), bytes);
            info!("NvsConfigStore: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut nvs = self.nvs.lock().map_err(|_| ConfigError::IoError)?;
            match nvs.set_blob(CONFIG_KEY, &bytes) {
                Ok(()) => {
                    info!("NvsConfigStore: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsConfigStore: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
