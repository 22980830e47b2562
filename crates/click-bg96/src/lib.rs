//! Quectel BG96 LTE Cat M1/NB1 modem driver.
//!
//! The driver turns high-level intents (open a socket, send an SMS, read a
//! GNSS fix) into [`AtCommand`] sequences run by the `click-at` scheduler,
//! and sequences the PWRKEY/STATUS pins for power control.
//!
//! - [`commands`]: command builders and BG96-specific response handlers
//! - [`gnss`]: `+QGPSLOC:` field extraction and coordinate conversion
//! - [`pdu`]: SMS-SUBMIT PDU encoding with GSM 7-bit packing
//! - [`power`]: the wake/sleep state machine
//! - [`Bg96`]: a session object owning all of the above
//!
//! Every operation is non-blocking: it queues work and returns. The caller
//! drives [`Bg96::process`] from its super-loop and learns about completion
//! through [`Bg96::output`] or an [`Bg96::on_complete`] listener.

pub mod commands;
pub mod config;
pub mod gnss;
pub mod pdu;
pub mod power;

pub use commands::{
    Registration, RegistrationStatus, Service, ServiceDomain, SmsMode, Socket,
};
pub use config::Bg96Config;
pub use gnss::GnssPosition;
pub use power::{PowerControl, PowerState, Transition};

use click_at::{AtCommand, AtOutput, AtResult, AtScheduler, EventCallback, Status, UrcHandler};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_io::{Read, ReadReady, Write};
use tracing::{debug, info, warn};

/// A BG96 session: AT scheduler, power control and configuration.
pub struct Bg96<U, P, S> {
    scheduler: AtScheduler<U>,
    power: PowerControl<P, S>,
    config: Bg96Config,
}

impl<U, P, S> Bg96<U, P, S>
where
    U: Read + Write + ReadReady,
    P: OutputPin,
    S: InputPin,
{
    pub fn new(uart: U, pwrkey: P, status: S, config: Bg96Config) -> Self {
        Bg96 {
            scheduler: AtScheduler::new(uart),
            power: PowerControl::new(pwrkey, status, &config),
            config,
        }
    }

    /// Initialise the AT channel. Unsolicited result codes are logged until
    /// [`Bg96::set_urc_handler`] installs another handler.
    pub fn init(&mut self) {
        self.scheduler.init();
        self.scheduler
            .set_urc_handler(Box::new(|line: &str| info!(urc = line, "bg96: unsolicited result code")));
    }

    /// One unit of work for the power sequence and the AT scheduler.
    pub fn process(&mut self, now_ms: u64) {
        if let Some(result) = self.power.process(now_ms) {
            let output = self.scheduler.output_mut();
            match result {
                Ok(()) => output.set_status(Status::Ok),
                Err(err) => {
                    warn!(%err, "bg96: power sequence failed");
                    output.report_error(err);
                    output.set_status(Status::Fail);
                }
            }
        }
        self.scheduler.process(now_ms);
    }

    /// Result of the last operation.
    pub fn output(&self) -> &AtOutput {
        self.scheduler.output()
    }

    /// No command sequence and no power sequence in progress.
    pub fn is_idle(&self) -> bool {
        !self.scheduler.is_running() && self.power.state() == PowerState::Ready
    }

    /// Call `callback` once the current operation ends (or `timeout_ms` passes).
    pub fn on_complete(&mut self, timeout_ms: u32, now_ms: u64, callback: EventCallback) {
        self.scheduler.listen(Status::Ok, timeout_ms, now_ms, callback);
    }

    pub fn set_urc_handler(&mut self, handler: UrcHandler) {
        self.scheduler.set_urc_handler(handler);
    }

    pub fn config(&self) -> &Bg96Config {
        &self.config
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn uart_mut(&mut self) -> &mut U {
        self.scheduler.uart_mut()
    }

    /// Queue a complete sequence and start it.
    ///
    /// Commands are built before anything is queued; if queueing fails the
    /// queue is cleared so no partial sequence can run later.
    fn submit<I>(&mut self, commands: I) -> AtResult<()>
    where
        I: IntoIterator<Item = AtCommand>,
    {
        if !self.is_idle() {
            return Err(click_at::AtError::Busy);
        }
        for cmd in commands {
            if let Err(err) = self.scheduler.add_cmd_to_q(cmd) {
                self.scheduler.clear_queue();
                return Err(err);
            }
        }
        debug!(commands = self.scheduler.queue_len(), "bg96: sequence submitted");
        self.scheduler.start_scheduler()
    }

    // ------------------------------------------------------------------------
    // Power
    // ------------------------------------------------------------------------

    pub fn is_alive(&mut self) -> AtResult<bool> {
        self.power.is_alive()
    }

    /// Power the module up. Completes immediately if STATUS already reads alive.
    pub fn wake_up(&mut self, now_ms: u64) -> AtResult<()> {
        if !self.is_idle() {
            return Err(click_at::AtError::Busy);
        }
        let transition = self.power.wake_up(now_ms)?;
        self.report_transition(transition);
        Ok(())
    }

    /// Power the module down. Completes immediately if STATUS already reads off.
    pub fn sleep(&mut self, now_ms: u64) -> AtResult<()> {
        if !self.is_idle() {
            return Err(click_at::AtError::Busy);
        }
        let transition = self.power.sleep(now_ms)?;
        self.report_transition(transition);
        Ok(())
    }

    fn report_transition(&mut self, transition: Transition) {
        let output = self.scheduler.output_mut();
        output.reset();
        output.set_status(match transition {
            Transition::Done => Status::Ok,
            Transition::Pending => Status::Busy,
        });
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn at(&mut self) -> AtResult<()> {
        let cmd = commands::at(&self.config)?;
        self.submit([cmd])
    }

    pub fn read_imei(&mut self) -> AtResult<()> {
        let cmd = commands::read_imei(&self.config)?;
        self.submit([cmd])
    }

    pub fn read_info(&mut self) -> AtResult<()> {
        let cmd = commands::read_info(&self.config)?;
        self.submit([cmd])
    }

    pub fn nb_init(&mut self) -> AtResult<()> {
        let cmds = commands::nb_init(&self.config)?;
        self.submit(cmds)
    }

    pub fn network_registration(&mut self) -> AtResult<()> {
        let cmd = commands::network_registration(&self.config)?;
        self.submit([cmd])
    }

    /// Decode the output of a finished [`Bg96::network_registration`].
    pub fn registration(&self) -> AtResult<Registration> {
        commands::parse_registration(self.output().data())
    }

    pub fn set_te_gsm(&mut self) -> AtResult<()> {
        let cmd = commands::set_te_gsm(&self.config)?;
        self.submit([cmd])
    }

    pub fn set_sms_mode(&mut self, mode: SmsMode) -> AtResult<()> {
        let cmd = commands::set_sms_mode(&self.config, mode)?;
        self.submit([cmd])
    }

    pub fn config_service_domain(&mut self, domain: ServiceDomain) -> AtResult<()> {
        let cmd = commands::config_service_domain(&self.config, domain)?;
        self.submit([cmd])
    }

    pub fn set_sim_apn(&mut self, apn: &str) -> AtResult<()> {
        let cmd = commands::set_sim_apn(&self.config, apn)?;
        self.submit([cmd])
    }

    pub fn activate_pdp(&mut self) -> AtResult<()> {
        let cmd = commands::activate_pdp(&self.config)?;
        self.submit([cmd])
    }

    pub fn open_connection(&mut self, socket: &Socket<'_>) -> AtResult<()> {
        let cmd = commands::open_connection(&self.config, socket)?;
        self.submit([cmd])
    }

    pub fn close_connection(&mut self, connect_id: u8) -> AtResult<()> {
        let cmd = commands::close_connection(&self.config, connect_id)?;
        self.submit([cmd])
    }

    pub fn send_data(&mut self, connect_id: u8, data: &[u8]) -> AtResult<()> {
        let cmd = commands::send_data(&self.config, connect_id, data)?;
        self.submit([cmd])
    }

    pub fn receive_data(&mut self, connect_id: u8, len: u16) -> AtResult<()> {
        let cmd = commands::receive_data(&self.config, connect_id, len)?;
        self.submit([cmd])
    }

    /// Text-mode SMS: GSM character set, text mode, then `AT+CMGS`.
    pub fn send_sms_text(&mut self, number: &str, text: &str) -> AtResult<()> {
        let cmds = [
            commands::set_te_gsm(&self.config)?,
            commands::set_sms_mode(&self.config, SmsMode::Text)?,
            commands::send_sms_text(&self.config, number, text)?,
        ];
        self.submit(cmds)
    }

    /// PDU-mode SMS: PDU mode, then `AT+CMGS` with the encoded PDU.
    pub fn send_sms_pdu(&mut self, number: &str, text: &str) -> AtResult<()> {
        let cmds = [
            commands::set_sms_mode(&self.config, SmsMode::Pdu)?,
            commands::send_sms_pdu(&self.config, number, text)?,
        ];
        self.submit(cmds)
    }

    pub fn gnss_start(&mut self) -> AtResult<()> {
        let cmd = commands::gnss_start(&self.config)?;
        self.submit([cmd])
    }

    pub fn gnss_stop(&mut self) -> AtResult<()> {
        let cmd = commands::gnss_stop(&self.config)?;
        self.submit([cmd])
    }

    pub fn gnss_get_position(&mut self) -> AtResult<()> {
        let cmd = commands::gnss_get_position(&self.config)?;
        self.submit([cmd])
    }

    /// Decode the output of a finished [`Bg96::gnss_get_position`].
    pub fn position(&self) -> AtResult<GnssPosition> {
        GnssPosition::parse(self.output().data())
    }
}
