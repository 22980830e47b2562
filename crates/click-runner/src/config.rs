//! Runner configuration.
//!
//! One YAML document carries the driver settings and the example
//! application parameters:
//!
//! ```yaml
//! bg96:
//!   pwrkey_pulse_ms: 1000
//! nfc:
//!   i2c_address: 0x28
//! app:
//!   apn: internet
//!   sms_number: "+46708251358"
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use click_bg96::Bg96Config;
use click_nci::NfcConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Complete runner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    pub bg96: Bg96Config,
    pub nfc: NfcConfig,
    pub app: AppConfig,
}

impl ClickConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Parameters of the example applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub apn: String,
    /// Destination of `sms` and `pdu`, international format.
    pub sms_number: String,
    pub sms_text: String,
    pub connect_id: u8,
    pub remote_host: String,
    pub remote_port: u16,
    /// Sent by `send`, read back by `recv`.
    pub socket_payload: String,
    /// Tag read cycles before the NFC application stops.
    pub tag_cycles: u32,
    /// T2T block read on every activation.
    pub tag_block: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            apn: "internet".to_string(),
            sms_number: "+46708251358".to_string(),
            sms_text: "hellohello".to_string(),
            connect_id: 0,
            remote_host: "echo.example.net".to_string(),
            remote_port: 7,
            socket_payload: "hello click".to_string(),
            tag_cycles: 1,
            tag_block: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ClickConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ClickConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
bg96:
  pwrkey_pulse_ms: 500
nfc:
  write_retries: 5
app:
  apn: iot.example
  tag_cycles: 3
"#;
        let config = ClickConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.bg96.pwrkey_pulse_ms, 500);
        assert_eq!(config.bg96.status_poll_ms, 200);
        assert_eq!(config.nfc.write_retries, 5);
        assert_eq!(config.nfc.i2c_address, 0x28);
        assert_eq!(config.app.apn, "iot.example");
        assert_eq!(config.app.tag_cycles, 3);
        assert_eq!(config.app.remote_port, 7);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            ClickConfig::from_yaml("bg96: [1, 2"),
            Err(ConfigError::YamlError(_))
        ));
    }
}
