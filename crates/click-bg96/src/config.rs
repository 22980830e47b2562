//! BG96 driver configuration.

use serde::{Deserialize, Serialize};

/// Timing parameters for the BG96 driver.
///
/// Every field has a default, so a partial YAML section is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bg96Config {
    /// How long PWRKEY is held to toggle the power state.
    pub pwrkey_pulse_ms: u32,
    /// Give up waiting for STATUS after this long.
    pub status_timeout_ms: u32,
    /// STATUS pin poll period.
    pub status_poll_ms: u32,
    /// Timeout for plain configuration and query commands.
    pub default_timeout_ms: u32,
    /// Timeout for PDP activation and socket open.
    pub network_timeout_ms: u32,
    /// Timeout for socket send and read.
    pub socket_timeout_ms: u32,
    /// Timeout for `AT+CMGS`.
    pub sms_timeout_ms: u32,
    /// Timeout for GNSS commands.
    pub gnss_timeout_ms: u32,
}

impl Default for Bg96Config {
    fn default() -> Self {
        Bg96Config {
            pwrkey_pulse_ms: 1_000,
            status_timeout_ms: 15_000,
            status_poll_ms: 200,
            default_timeout_ms: 300,
            network_timeout_ms: 150_000,
            socket_timeout_ms: 5_000,
            sms_timeout_ms: 120_000,
            gnss_timeout_ms: 1_000,
        }
    }
}
