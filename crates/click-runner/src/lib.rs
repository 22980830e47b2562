//! Host-side harness for the Click board drivers.
//!
//! Runs the BG96 and PN7150 example applications against simulated
//! boards, so both protocol engines can be exercised without hardware.

pub mod apps;
pub mod config;
pub mod sim_modem;
pub mod sim_nfc;

pub use apps::{AppError, Bg96App, CommandResult, NfcApp, NfcState, TagRead, DEFAULT_BG96_SCRIPT};
pub use config::{AppConfig, ClickConfig, ConfigError};
pub use sim_modem::{SimModem, SimPower, SimPwrKey, SimStatus};
pub use sim_nfc::SimPn7150;

use click_bg96::Bg96;
use click_nci::Nci;

/// The BG96 driver wired to a simulated modem.
pub type SimBg96 = Bg96<SimModem, SimPwrKey, SimStatus>;

/// Build a BG96 application on a simulated modem that starts powered off.
pub fn simulated_bg96(config: &ClickConfig) -> Bg96App<SimModem, SimPwrKey, SimStatus> {
    let power = SimPower::new(false);
    let bg96: SimBg96 = Bg96::new(
        SimModem::new(power.clone()),
        SimPwrKey::new(power.clone()),
        SimStatus::new(power),
        config.bg96.clone(),
    );
    Bg96App::new(bg96, config.app.clone())
}

/// Build an NFC application on a simulated PN7150 with its IRQ attached.
pub fn simulated_nfc(config: &ClickConfig) -> NfcApp<SimPn7150> {
    let mut nci = Nci::new(SimPn7150::new());
    let irq = nci.packet_ready();
    nci.transport_mut().attach_irq(irq);
    NfcApp::new(nci, &config.app)
}
