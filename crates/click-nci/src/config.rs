//! PN7150 transport configuration.

use serde::{Deserialize, Serialize};

use crate::constants::PN7150_I2C_ADDRESS;

/// I2C and VEN timing for [`crate::Tml`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfcConfig {
    /// 7-bit I2C address.
    pub i2c_address: u8,
    /// Additional write attempts after a NACK (the controller may be asleep).
    pub write_retries: u8,
    pub retry_delay_ms: u32,
    /// VEN low time during reset, and the settle time after it.
    pub ven_pulse_ms: u32,
}

impl Default for NfcConfig {
    fn default() -> Self {
        NfcConfig {
            i2c_address: PN7150_I2C_ADDRESS,
            write_retries: 3,
            retry_delay_ms: 10,
            ven_pulse_ms: 10,
        }
    }
}
