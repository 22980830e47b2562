//! The two example applications.
//!
//! [`Bg96App`] dispatches CLI-style command names to the modem driver and
//! runs each one to completion on a virtual clock. [`NfcApp`] is an
//! event-dispatch loop that brings the controller up and reads a block
//! from every tag it activates.

use click_at::{AtError, Status};
use click_bg96::{Bg96, Service, Socket};
use click_nci::*;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_io::{Read, ReadReady, Write};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// Longest simulated time a single BG96 command may take.
pub const COMMAND_BUDGET_MS: u64 = 200_000;

/// Errors that stop an example application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("AT error: {0}")]
    At(#[from] AtError),

    #[error("NCI error: {0}")]
    Nci(#[from] NciError),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{event} failed with status {status}")]
    Status { event: &'static str, status: &'static str },

    #[error("no progress after {0} polls")]
    Stalled(u32),
}

// ============================================================================
// BG96
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bg96Action {
    GnssStart,
    GnssStop,
    Gnss,
    Wakeup,
    Sleep,
    Alive,
    Imei,
    Info,
    Init,
    Reg,
    Apn,
    Open,
    Send,
    Recv,
    Close,
    Sms,
    Pdu,
}

/// Command names, compared as fixed-length prefixes. Longer names sharing
/// a prefix with a shorter one come first.
const BG96_COMMANDS: &[(&str, Bg96Action)] = &[
    ("gnss_start", Bg96Action::GnssStart),
    ("gnss_stop", Bg96Action::GnssStop),
    ("gnss", Bg96Action::Gnss),
    ("wakeup", Bg96Action::Wakeup),
    ("sleep", Bg96Action::Sleep),
    ("alive", Bg96Action::Alive),
    ("imei", Bg96Action::Imei),
    ("info", Bg96Action::Info),
    ("init", Bg96Action::Init),
    ("reg", Bg96Action::Reg),
    ("apn", Bg96Action::Apn),
    ("open", Bg96Action::Open),
    ("send", Bg96Action::Send),
    ("recv", Bg96Action::Recv),
    ("close", Bg96Action::Close),
    ("sms", Bg96Action::Sms),
    ("pdu", Bg96Action::Pdu),
];

/// Default script for `clicksim bg96`.
pub const DEFAULT_BG96_SCRIPT: &[&str] = &[
    "wakeup", "alive", "imei", "info", "init", "reg", "apn", "open", "send", "recv", "close", "sms", "pdu",
    "gnss_start", "gnss", "gnss_stop", "sleep",
];

/// Outcome of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: String,
    pub status: Status,
    pub error: Option<AtError>,
    pub data: String,
}

pub struct Bg96App<U, P, S> {
    bg96: Bg96<U, P, S>,
    config: AppConfig,
    now_ms: u64,
}

impl<U, P, S> Bg96App<U, P, S>
where
    U: Read + Write + ReadReady,
    P: OutputPin,
    S: InputPin,
{
    pub fn new(mut bg96: Bg96<U, P, S>, config: AppConfig) -> Self {
        bg96.init();
        Bg96App {
            bg96,
            config,
            now_ms: 0,
        }
    }

    pub fn bg96(&self) -> &Bg96<U, P, S> {
        &self.bg96
    }

    pub fn bg96_mut(&mut self) -> &mut Bg96<U, P, S> {
        &mut self.bg96
    }

    /// Virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn lookup(command: &str) -> Option<Bg96Action> {
        BG96_COMMANDS
            .iter()
            .find(|(name, _)| command.len() >= name.len() && command.as_bytes()[..name.len()] == *name.as_bytes())
            .map(|(_, action)| *action)
    }

    /// Start the operation named by `command`.
    pub fn dispatch(&mut self, command: &str) -> Result<(), AppError> {
        let action = Self::lookup(command).ok_or_else(|| AppError::UnknownCommand(command.to_string()))?;
        let now = self.now_ms;
        let config = &self.config;
        let bg96 = &mut self.bg96;
        match action {
            Bg96Action::Wakeup => bg96.wake_up(now)?,
            Bg96Action::Sleep => bg96.sleep(now)?,
            Bg96Action::Alive => {
                let alive = bg96.is_alive()?;
                info!(alive, "bg96 app: STATUS pin");
            }
            Bg96Action::Imei => bg96.read_imei()?,
            Bg96Action::Info => bg96.read_info()?,
            Bg96Action::Init => bg96.nb_init()?,
            Bg96Action::Reg => bg96.network_registration()?,
            Bg96Action::Apn => bg96.set_sim_apn(&config.apn)?,
            Bg96Action::Open => {
                let socket = Socket {
                    connect_id: config.connect_id,
                    service: Service::Tcp,
                    remote: &config.remote_host,
                    port: config.remote_port,
                };
                bg96.open_connection(&socket)?
            }
            Bg96Action::Send => bg96.send_data(config.connect_id, config.socket_payload.as_bytes())?,
            Bg96Action::Recv => {
                let len = u16::try_from(config.socket_payload.len()).map_err(|_| AtError::InvalidParameter)?;
                bg96.receive_data(config.connect_id, len)?
            }
            Bg96Action::Close => bg96.close_connection(config.connect_id)?,
            Bg96Action::Sms => bg96.send_sms_text(&config.sms_number, &config.sms_text)?,
            Bg96Action::Pdu => bg96.send_sms_pdu(&config.sms_number, &config.sms_text)?,
            Bg96Action::GnssStart => bg96.gnss_start()?,
            Bg96Action::Gnss => bg96.gnss_get_position()?,
            Bg96Action::GnssStop => bg96.gnss_stop()?,
        }
        Ok(())
    }

    /// Advance the super-loop until the driver is idle and every byte the
    /// modem sent has been consumed, so trailing URCs are not mistaken for
    /// the next command's response.
    pub fn run_until_idle(&mut self) {
        let deadline = self.now_ms + COMMAND_BUDGET_MS;
        while self.now_ms < deadline {
            let pending = self.bg96.uart_mut().read_ready().unwrap_or(false);
            if self.bg96.is_idle() && !pending {
                break;
            }
            self.bg96.process(self.now_ms);
            self.now_ms += 1;
        }
        // Let listeners observe the final status.
        self.bg96.process(self.now_ms);
    }

    /// Dispatch and complete one command.
    pub fn run_command(&mut self, command: &str) -> Result<CommandResult, AppError> {
        let immediate = |status: Status, error: Option<AtError>, data: String| CommandResult {
            command: command.to_string(),
            status,
            error,
            data,
        };
        // STATUS is sampled directly; nothing is queued.
        if Self::lookup(command) == Some(Bg96Action::Alive) {
            let alive = self.bg96.is_alive()?;
            return Ok(immediate(Status::Ok, None, alive.to_string()));
        }
        match self.dispatch(command) {
            Ok(()) => {}
            Err(AppError::At(err)) => {
                warn!(command, %err, "bg96 app: command rejected");
                return Ok(immediate(Status::Fail, Some(err), String::new()));
            }
            Err(err) => return Err(err),
        }
        self.run_until_idle();

        let output = self.bg96.output();
        let result = CommandResult {
            command: command.to_string(),
            status: output.status(),
            error: output.error(),
            data: output.data().to_string(),
        };
        match result.status {
            Status::Fail => warn!(
                command,
                error = ?result.error,
                at_ms = self.now_ms,
                "bg96 app: command failed"
            ),
            _ => info!(command, data = %result.data, at_ms = self.now_ms, "bg96 app: command done"),
        }
        Ok(result)
    }

    /// Run every command of `script`; a failed command does not stop the script.
    pub fn run_script<I, C>(&mut self, script: I) -> Result<Vec<CommandResult>, AppError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        script
            .into_iter()
            .map(|command| self.run_command(command.as_ref()))
            .collect()
    }
}

// ============================================================================
// NFC
// ============================================================================

/// Where the NFC application is in its bring-up and read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcState {
    Idle,
    WaitReset,
    WaitInit,
    WaitAct,
    WaitDiscoverMap,
    WaitDiscover,
    WaitActivation,
    WaitRead,
    WaitDeactivate,
    Done,
}

/// One tag read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRead {
    pub uid: Vec<u8>,
    pub block: u8,
    pub data: Vec<u8>,
}

pub struct NfcApp<T> {
    nci: Nci<T>,
    state: NfcState,
    cycles_left: u32,
    block: u8,
    uid: Vec<u8>,
    reads: Vec<TagRead>,
}

impl<T: NciTransport> NfcApp<T> {
    pub fn new(nci: Nci<T>, config: &AppConfig) -> Self {
        NfcApp {
            nci,
            state: NfcState::Idle,
            cycles_left: config.tag_cycles,
            block: config.tag_block,
            uid: Vec::new(),
            reads: Vec::new(),
        }
    }

    pub fn state(&self) -> NfcState {
        self.state
    }

    pub fn reads(&self) -> &[TagRead] {
        &self.reads
    }

    pub fn nci(&self) -> &Nci<T> {
        &self.nci
    }

    pub fn nci_mut(&mut self) -> &mut Nci<T> {
        &mut self.nci
    }

    /// Reset the controller and start the sequence.
    pub fn start(&mut self) -> Result<(), AppError> {
        self.nci.core_reset(RESET_TYPE_RESET_CONFIG)?;
        self.state = if self.cycles_left == 0 {
            NfcState::Done
        } else {
            NfcState::WaitReset
        };
        Ok(())
    }

    /// Poll once and react to the event.
    ///
    /// Returns `true` once every requested tag cycle has completed.
    pub fn step(&mut self) -> Result<bool, AppError> {
        let event = self.nci.get_event()?.clone();
        if event.is_none() {
            return Ok(self.state == NfcState::Done);
        }
        debug!(event = event.name(), state = ?self.state, "nfc app: event");

        if let Some(status) = event.status() {
            if status != STATUS_OK {
                return Err(AppError::Status {
                    event: event.name(),
                    status: dbg::status_name(status),
                });
            }
        }

        match (self.state, event) {
            (NfcState::WaitReset, NciEvent::CoreResetRsp(_)) => {
                self.nci.core_init()?;
                self.state = NfcState::WaitInit;
            }
            (NfcState::WaitInit, NciEvent::CoreInitRsp(init)) => {
                info!(interfaces = %hex::encode_upper(&init.rf_interfaces), "nfc app: controller initialised");
                self.nci.prop_act()?;
                self.state = NfcState::WaitAct;
            }
            (NfcState::WaitAct, NciEvent::PropActRsp { info, .. }) => {
                info!(firmware = %hex::encode_upper(&info), "nfc app: proprietary extension active");
                self.nci.rf_discover_map(&[
                    DiscoverMapping {
                        protocol: PROTOCOL_T2T,
                        mode: MAP_MODE_POLL,
                        interface: INTERFACE_FRAME,
                    },
                    DiscoverMapping {
                        protocol: PROTOCOL_ISO_DEP,
                        mode: MAP_MODE_POLL,
                        interface: INTERFACE_ISO_DEP,
                    },
                ])?;
                self.state = NfcState::WaitDiscoverMap;
            }
            (NfcState::WaitDiscoverMap, NciEvent::RfDiscoverMapRsp { .. }) => {
                self.nci.rf_discover(&[
                    DiscoverConfig {
                        mode_tech: MODE_POLL | TECH_PASSIVE_NFCA,
                        frequency: 1,
                    },
                    DiscoverConfig {
                        mode_tech: MODE_POLL | TECH_PASSIVE_NFCB,
                        frequency: 1,
                    },
                ])?;
                self.state = NfcState::WaitDiscover;
            }
            (NfcState::WaitDiscover, NciEvent::RfDiscoverRsp { .. }) => {
                self.state = NfcState::WaitActivation;
            }
            (NfcState::WaitActivation, NciEvent::RfIntfActivatedNtf(act)) => {
                self.uid = match &act.params {
                    TechParams::NfcAPoll(params) => params.nfcid1.clone(),
                    TechParams::Raw(_) => Vec::new(),
                };
                info!(
                    uid = %hex::encode_upper(&self.uid),
                    protocol = dbg::protocol_name(act.protocol),
                    "nfc app: tag activated"
                );
                if act.protocol == PROTOCOL_T2T {
                    self.nci.data_packet_send(CONN_ID_STATIC_RF, &[crate::sim_nfc::T2T_READ, self.block])?;
                    self.state = NfcState::WaitRead;
                } else {
                    self.finish_cycle()?;
                }
            }
            (NfcState::WaitRead, NciEvent::Data { payload, .. }) => {
                // The frame interface appends a status byte.
                let data = match payload.split_last() {
                    Some((_, data)) => data.to_vec(),
                    None => Vec::new(),
                };
                info!(block = self.block, data = %hex::encode_upper(&data), "nfc app: block read");
                self.reads.push(TagRead {
                    uid: self.uid.clone(),
                    block: self.block,
                    data,
                });
                self.finish_cycle()?;
            }
            (NfcState::WaitDeactivate, NciEvent::RfDeactivateNtf(ntf)) => {
                self.state = if ntf.deactivation_type == DEACTIVATION_IDLE {
                    NfcState::Done
                } else {
                    NfcState::WaitActivation
                };
            }
            (state, event) => debug!(event = event.name(), ?state, "nfc app: event ignored"),
        }
        Ok(self.state == NfcState::Done)
    }

    fn finish_cycle(&mut self) -> Result<(), AppError> {
        self.cycles_left = self.cycles_left.saturating_sub(1);
        let kind = if self.cycles_left == 0 {
            DEACTIVATION_IDLE
        } else {
            DEACTIVATION_DISCOVERY
        };
        self.nci.rf_deactivate(kind)?;
        self.state = NfcState::WaitDeactivate;
        Ok(())
    }

    /// Start and step until done, giving up after `max_polls` polls.
    pub fn run(&mut self, max_polls: u32) -> Result<&[TagRead], AppError> {
        self.start()?;
        for _ in 0..max_polls {
            if self.step()? {
                info!(reads = self.reads.len(), "nfc app: done");
                return Ok(&self.reads);
            }
        }
        Err(AppError::Stalled(max_polls))
    }
}
