//! BG96 command builders and response handlers.
//!
//! Every builder returns a fresh [`AtCommand`], so a failed build never leaves
//! a half-assembled descriptor behind for the next call.

use click_at::handlers::{collect_data, ok_error};
use click_at::{AtCommand, AtError, AtOutput, AtResult, Line, Step, AT_PAYLOAD_MAX_LEN, CTRL_Z};
use tracing::{debug, trace};

use crate::config::Bg96Config;
use crate::pdu::{self, SmsSubmitPdu};

// ============================================================================
// Parameters
// ============================================================================

/// Socket service type for `AT+QIOPEN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Tcp,
    Udp,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Tcp => "TCP",
            Service::Udp => "UDP",
        }
    }
}

/// Remote endpoint of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Socket<'a> {
    /// Socket index, 0..=11.
    pub connect_id: u8,
    pub service: Service,
    pub remote: &'a str,
    pub port: u16,
}

/// Message format for `AT+CMGF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SmsMode {
    Pdu = 0,
    Text = 1,
}

/// Service domain for `AT+QCFG="servicedomain"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceDomain {
    CsOnly = 0,
    PsOnly = 1,
    CsAndPs = 2,
}

/// Highest valid socket index.
pub const MAX_CONNECT_ID: u8 = 11;

/// Radio configuration applied by [`nb_init`]: LTE Cat NB1 first, band 20.
pub const NB_INIT_COMMANDS: [&str; 4] = [
    "AT+QCFG=\"nwscanseq\",03,1",
    "AT+QCFG=\"nwscanmode\",3,1",
    "AT+QCFG=\"iotopmode\",1,1",
    "AT+QCFG=\"band\",0,0,80000,1",
];

// ============================================================================
// Builders
// ============================================================================

pub fn at(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT", ok_error, config.default_timeout_ms)
}

/// `AT+GSN`: the IMEI lands in the output data.
pub fn read_imei(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+GSN", collect_data, config.default_timeout_ms)
}

/// `ATI`: manufacturer, model and revision lines.
pub fn read_info(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("ATI", collect_data, config.default_timeout_ms)
}

pub fn nb_init(config: &Bg96Config) -> AtResult<[AtCommand; 4]> {
    let [a, b, c, d] = NB_INIT_COMMANDS;
    Ok([
        AtCommand::new(a, ok_error, config.default_timeout_ms)?,
        AtCommand::new(b, ok_error, config.default_timeout_ms)?,
        AtCommand::new(c, ok_error, config.default_timeout_ms)?,
        AtCommand::new(d, ok_error, config.default_timeout_ms)?,
    ])
}

/// `AT+CEREG?`; decode the output with [`parse_registration`].
pub fn network_registration(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+CEREG?", collect_data, config.default_timeout_ms)
}

pub fn set_te_gsm(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+CSCS=\"GSM\"", ok_error, config.default_timeout_ms)
}

pub fn set_sms_mode(config: &Bg96Config, mode: SmsMode) -> AtResult<AtCommand> {
    let mut cmd = AtCommand::new("AT+CMGF=", ok_error, config.default_timeout_ms)?;
    cmd.extend_num(mode as u32)?;
    Ok(cmd)
}

pub fn config_service_domain(config: &Bg96Config, domain: ServiceDomain) -> AtResult<AtCommand> {
    let mut cmd = AtCommand::new("AT+QCFG=\"servicedomain\",", ok_error, config.default_timeout_ms)?;
    cmd.extend_num(domain as u32)?;
    cmd.extend(",1")?;
    Ok(cmd)
}

/// `AT+CGDCONT=1,"IP","<apn>"`.
pub fn set_sim_apn(config: &Bg96Config, apn: &str) -> AtResult<AtCommand> {
    if apn.is_empty() {
        return Err(AtError::InvalidParameter);
    }
    let mut cmd = AtCommand::new("AT+CGDCONT=1,\"IP\",", ok_error, config.default_timeout_ms)?;
    cmd.extend_quoted(apn)?;
    Ok(cmd)
}

pub fn activate_pdp(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+QIACT=1", ok_error, config.network_timeout_ms)
}

/// `AT+QIOPEN=1,<id>,"<service>","<remote>",<port>,0,0` (buffer access mode).
pub fn open_connection(config: &Bg96Config, socket: &Socket<'_>) -> AtResult<AtCommand> {
    check_connect_id(socket.connect_id)?;
    if socket.remote.is_empty() {
        return Err(AtError::InvalidParameter);
    }
    let mut cmd = AtCommand::new("AT+QIOPEN=1,", qiopen, config.network_timeout_ms)?;
    cmd.extend_num(u32::from(socket.connect_id))?;
    cmd.extend(",")?;
    cmd.extend_quoted(socket.service.as_str())?;
    cmd.extend(",")?;
    cmd.extend_quoted(socket.remote)?;
    cmd.extend(",")?;
    cmd.extend_num(u32::from(socket.port))?;
    cmd.extend(",0,0")?;
    Ok(cmd)
}

pub fn close_connection(config: &Bg96Config, connect_id: u8) -> AtResult<AtCommand> {
    check_connect_id(connect_id)?;
    let mut cmd = AtCommand::new("AT+QICLOSE=", ok_error, config.network_timeout_ms)?;
    cmd.extend_num(u32::from(connect_id))?;
    Ok(cmd)
}

/// `AT+QISEND=<id>,<len>`, then `data` after the prompt.
pub fn send_data(config: &Bg96Config, connect_id: u8, data: &[u8]) -> AtResult<AtCommand> {
    check_connect_id(connect_id)?;
    if data.is_empty() {
        return Err(AtError::InvalidParameter);
    }
    let mut cmd = AtCommand::new("AT+QISEND=", qisend, config.socket_timeout_ms)?;
    cmd.extend_num(u32::from(connect_id))?;
    cmd.extend(",")?;
    cmd.extend_num(data.len() as u32)?;
    cmd.set_payload(data)?;
    Ok(cmd)
}

/// `AT+QIRD=<id>,<len>`: up to `len` buffered bytes land in the output data.
pub fn receive_data(config: &Bg96Config, connect_id: u8, len: u16) -> AtResult<AtCommand> {
    check_connect_id(connect_id)?;
    let mut cmd = AtCommand::new("AT+QIRD=", qird, config.socket_timeout_ms)?;
    cmd.extend_num(u32::from(connect_id))?;
    cmd.extend(",")?;
    cmd.extend_num(u32::from(len))?;
    Ok(cmd)
}

/// Text-mode SMS: `AT+CMGS="<number>"`, then the text and SUB after the prompt.
pub fn send_sms_text(config: &Bg96Config, number: &str, text: &str) -> AtResult<AtCommand> {
    if number.is_empty() || text.bytes().any(|b| b == CTRL_Z || b == 0x1B) {
        return Err(AtError::InvalidParameter);
    }
    let mut cmd = AtCommand::new("AT+CMGS=", cmgs, config.sms_timeout_ms)?;
    cmd.extend_quoted(number)?;

    if text.len() + 1 > AT_PAYLOAD_MAX_LEN {
        return Err(AtError::BufferOverflow {
            max: AT_PAYLOAD_MAX_LEN,
            actual: text.len() + 1,
        });
    }
    let mut payload: heapless::Vec<u8, AT_PAYLOAD_MAX_LEN> = heapless::Vec::new();
    let _ = payload.extend_from_slice(text.as_bytes());
    let _ = payload.push(CTRL_Z);
    cmd.set_payload(&payload)?;
    Ok(cmd)
}

/// PDU-mode SMS: `AT+CMGS=<tpdu_len>`, then the hex PDU and SUB after the prompt.
pub fn send_sms_pdu(config: &Bg96Config, number: &str, text: &str) -> AtResult<AtCommand> {
    let pdu = SmsSubmitPdu::new(number, text).encode()?;
    let hex = pdu::to_hex(&pdu)?;
    debug!(tpdu_len = pdu::tpdu_len(&pdu), "bg96: encoded SMS PDU");

    let mut cmd = AtCommand::new("AT+CMGS=", cmgs, config.sms_timeout_ms)?;
    cmd.extend_num(pdu::tpdu_len(&pdu) as u32)?;

    let mut payload: heapless::Vec<u8, AT_PAYLOAD_MAX_LEN> = heapless::Vec::new();
    // The hex PDU is at most 510 bytes.
    let _ = payload.extend_from_slice(hex.as_bytes());
    let _ = payload.push(CTRL_Z);
    cmd.set_payload(&payload)?;
    Ok(cmd)
}

pub fn gnss_start(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+QGPS=1", ok_error, config.gnss_timeout_ms)
}

pub fn gnss_stop(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+QGPSEND", ok_error, config.gnss_timeout_ms)
}

/// `AT+QGPSLOC=0`; decode the output with [`crate::gnss::GnssPosition::parse`].
pub fn gnss_get_position(config: &Bg96Config) -> AtResult<AtCommand> {
    AtCommand::new("AT+QGPSLOC=0", qgpsloc, config.gnss_timeout_ms)
}

fn check_connect_id(connect_id: u8) -> AtResult<()> {
    if connect_id > MAX_CONNECT_ID {
        return Err(AtError::InvalidParameter);
    }
    Ok(())
}

// ============================================================================
// Response handlers
// ============================================================================

fn timed_out(output: &mut AtOutput) -> Step {
    output.report_error(AtError::Timeout);
    Step::Finish
}

fn failed(line: &Line<'_>, output: &mut AtOutput) -> Step {
    debug!(line = line.text, "bg96: device error");
    output.report_error(AtError::Fail);
    Step::Finish
}

fn store(text: &str, output: &mut AtOutput) {
    if let Err(err) = output.report_data(text) {
        output.report_error(err);
    }
}

/// `AT+QIOPEN`: `OK` only acknowledges the request; the result arrives later
/// as `+QIOPEN: <connectID>,<err>`.
pub fn qiopen(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        return timed_out(output);
    };
    if let Some(value) = line.value_of("+QIOPEN") {
        let err = value
            .split(',')
            .nth(1)
            .and_then(|e| e.trim().parse::<u16>().ok());
        if err == Some(0) {
            store(value, output);
        } else {
            debug!(result = value, "bg96: socket open failed");
            output.report_error(AtError::Fail);
        }
        return Step::Finish;
    }
    if line.is_error() {
        return failed(line, output);
    }
    Step::Continue
}

/// `AT+QISEND`: payload on the prompt, then `SEND OK` or `SEND FAIL`.
pub fn qisend(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        return timed_out(output);
    };
    match line.text {
        _ if line.prompt => Step::SendPayload,
        "SEND OK" => Step::Finish,
        "SEND FAIL" => failed(line, output),
        _ if line.is_error() => failed(line, output),
        _ => Step::Continue,
    }
}

/// `AT+QIRD`: `+QIRD: <len>`, then the data line, then `OK`.
pub fn qird(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        return timed_out(output);
    };
    if line.is_ok() {
        return Step::Finish;
    }
    if line.is_error() {
        return failed(line, output);
    }
    match line.value_of("+QIRD") {
        Some(len) => trace!(len, "bg96: socket read"),
        None => store(line.text, output),
    }
    Step::Continue
}

/// `AT+CMGS`: payload on the prompt; `+CMGS: <mr>` lands in the output data.
pub fn cmgs(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        return timed_out(output);
    };
    if line.prompt {
        return Step::SendPayload;
    }
    if let Some(reference) = line.value_of("+CMGS") {
        store(reference, output);
        return Step::Continue;
    }
    ok_error(Some(line), output)
}

/// `AT+QGPSLOC`: keeps the whole `+QGPSLOC:` line; `+CME ERROR: 516` means no fix yet.
pub fn qgpsloc(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        return timed_out(output);
    };
    if line.text.starts_with(crate::gnss::QGPSLOC_MARKER) {
        store(line.text, output);
        return Step::Continue;
    }
    ok_error(Some(line), output)
}

// ============================================================================
// Parsers
// ============================================================================

/// EPS registration status from `+CEREG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    NotRegistered,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
}

impl RegistrationStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => RegistrationStatus::NotRegistered,
            1 => RegistrationStatus::Home,
            2 => RegistrationStatus::Searching,
            3 => RegistrationStatus::Denied,
            4 => RegistrationStatus::Unknown,
            5 => RegistrationStatus::Roaming,
            _ => return None,
        })
    }

    pub fn is_registered(self) -> bool {
        matches!(self, RegistrationStatus::Home | RegistrationStatus::Roaming)
    }
}

/// Parsed `+CEREG: <n>,<stat>` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// URC reporting mode.
    pub mode: u8,
    pub status: RegistrationStatus,
}

/// Parse the output of [`network_registration`].
pub fn parse_registration(data: &str) -> AtResult<Registration> {
    let value = data
        .lines()
        .find_map(|l| l.trim().strip_prefix("+CEREG:"))
        .ok_or(AtError::Fail)?;
    let mut fields = value.split(',').map(str::trim);
    let mode = fields
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or(AtError::InvalidParameter)?;
    let status = fields
        .next()
        .and_then(|s| s.parse().ok())
        .and_then(RegistrationStatus::from_code)
        .ok_or(AtError::InvalidParameter)?;
    Ok(Registration { mode, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Line<'_> {
        Line { text, number: 1, prompt: false }
    }

    #[test]
    fn test_open_connection_text() {
        let config = Bg96Config::default();
        let socket = Socket {
            connect_id: 0,
            service: Service::Tcp,
            remote: "220.180.239.212",
            port: 8009,
        };
        let cmd = open_connection(&config, &socket).unwrap();
        assert_eq!(cmd.text(), "AT+QIOPEN=1,0,\"TCP\",\"220.180.239.212\",8009,0,0");
        assert_eq!(cmd.timeout_ms(), config.network_timeout_ms);

        let bad = Socket { connect_id: 12, ..socket };
        assert_eq!(open_connection(&config, &bad).unwrap_err(), AtError::InvalidParameter);
    }

    #[test]
    fn test_simple_builders() {
        let config = Bg96Config::default();
        assert_eq!(set_sms_mode(&config, SmsMode::Text).unwrap().text(), "AT+CMGF=1");
        assert_eq!(
            config_service_domain(&config, ServiceDomain::PsOnly).unwrap().text(),
            "AT+QCFG=\"servicedomain\",1,1"
        );
        assert_eq!(
            set_sim_apn(&config, "internet").unwrap().text(),
            "AT+CGDCONT=1,\"IP\",\"internet\""
        );
        assert_eq!(receive_data(&config, 1, 1500).unwrap().text(), "AT+QIRD=1,1500");
        assert_eq!(close_connection(&config, 3).unwrap().text(), "AT+QICLOSE=3");
        assert_eq!(nb_init(&config).unwrap()[3].text(), NB_INIT_COMMANDS[3]);
    }

    #[test]
    fn test_send_data_sets_payload() {
        let cmd = send_data(&Bg96Config::default(), 0, b"hello").unwrap();
        assert_eq!(cmd.text(), "AT+QISEND=0,5");
        assert_eq!(cmd.payload(), b"hello");
    }

    #[test]
    fn test_sms_payloads_end_with_sub() {
        let config = Bg96Config::default();
        let text = send_sms_text(&config, "+36301234567", "hi").unwrap();
        assert_eq!(text.text(), "AT+CMGS=\"+36301234567\"");
        assert_eq!(text.payload(), b"hi\x1A");

        let pdu = send_sms_pdu(&config, "+46708251358", "hellohello").unwrap();
        assert_eq!(pdu.text(), "AT+CMGS=23");
        assert_eq!(pdu.payload(), b"0011000B916407281553F80000AA0AE8329BFD4697D9EC37\x1A");
    }

    #[test]
    fn test_qiopen_waits_for_urc() {
        let mut output = AtOutput::new();
        assert_eq!(qiopen(Some(&line("OK")), &mut output), Step::Continue);
        assert_eq!(qiopen(Some(&line("+QIOPEN: 0,0")), &mut output), Step::Finish);
        assert_eq!(output.error(), None);
        assert_eq!(output.data(), "0,0");

        let mut output = AtOutput::new();
        assert_eq!(qiopen(Some(&line("+QIOPEN: 0,565")), &mut output), Step::Finish);
        assert_eq!(output.error(), Some(AtError::Fail));
    }

    #[test]
    fn test_qird_collects_payload() {
        let mut output = AtOutput::new();
        assert_eq!(qird(Some(&line("+QIRD: 5")), &mut output), Step::Continue);
        assert_eq!(qird(Some(&line("hello")), &mut output), Step::Continue);
        assert_eq!(qird(Some(&line("OK")), &mut output), Step::Finish);
        assert_eq!(output.data(), "hello");
    }

    #[test]
    fn test_cmgs_reference() {
        let mut output = AtOutput::new();
        let prompt = Line { text: "> ", number: 1, prompt: true };
        assert_eq!(cmgs(Some(&prompt), &mut output), Step::SendPayload);
        assert_eq!(cmgs(Some(&line("+CMGS: 17")), &mut output), Step::Continue);
        assert_eq!(cmgs(Some(&line("OK")), &mut output), Step::Finish);
        assert_eq!(output.data(), "17");
    }

    #[test]
    fn test_qgpsloc_no_fix() {
        let mut output = AtOutput::new();
        assert_eq!(qgpsloc(Some(&line("+CME ERROR: 516")), &mut output), Step::Finish);
        assert_eq!(output.error(), Some(AtError::Fail));
        assert_eq!(qgpsloc(None, &mut AtOutput::new()), Step::Finish);
    }

    #[test]
    fn test_parse_registration() {
        let reg = parse_registration("+CEREG: 0,5").unwrap();
        assert_eq!(reg.mode, 0);
        assert_eq!(reg.status, RegistrationStatus::Roaming);
        assert!(reg.status.is_registered());

        assert_eq!(parse_registration("OK"), Err(AtError::Fail));
        assert_eq!(parse_registration("+CEREG: 0,9"), Err(AtError::InvalidParameter));
    }
}
