//! A simulated BG96 behind a UART and two GPIOs.
//!
//! The modem answers the subset of the AT command set the driver uses.
//! Replies are queued as soon as the command's `\r` arrives. While powered
//! down it ignores everything, so commands time out as on real hardware.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use tracing::{debug, trace};

const IMEI: &str = "866425031234567";
const INFO: &str = "Quectel\r\nBG96\r\nRevision: BG96MAR02A07M1G";
const GNSS_FIX: &str = "+QGPSLOC: 013828.0,3150.7223N,11711.9293E,0.7,62.2,2,0.00,0.0,0.0,130817,09";
const SUB: u8 = 0x1A;

/// The module's power line, shared by the PWRKEY and STATUS pins and the modem.
#[derive(Debug, Clone, Default)]
pub struct SimPower(Rc<Cell<bool>>);

impl SimPower {
    pub fn new(alive: bool) -> Self {
        SimPower(Rc::new(Cell::new(alive)))
    }

    pub fn is_on(&self) -> bool {
        self.0.get()
    }

    fn toggle(&self) {
        self.0.set(!self.0.get());
    }
}

/// PWRKEY: releasing a held key toggles the power state.
pub struct SimPwrKey {
    power: SimPower,
    held: bool,
}

impl SimPwrKey {
    pub fn new(power: SimPower) -> Self {
        SimPwrKey { power, held: false }
    }
}

impl embedded_hal::digital::ErrorType for SimPwrKey {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimPwrKey {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.held {
            self.power.toggle();
            debug!(on = self.power.is_on(), "sim bg96: PWRKEY pulse");
        }
        self.held = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.held = true;
        Ok(())
    }
}

/// STATUS: high while the module is powered.
pub struct SimStatus(SimPower);

impl SimStatus {
    pub fn new(power: SimPower) -> Self {
        SimStatus(power)
    }
}

impl embedded_hal::digital::ErrorType for SimStatus {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for SimStatus {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.is_on())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.is_on())
    }
}

/// What the modem does with bytes after a `> ` prompt.
#[derive(Debug, Clone, Copy)]
enum DataMode {
    /// `AT+QISEND`: a fixed byte count for a socket.
    Socket { connect_id: u8, len: usize },
    /// `AT+CMGS`: everything up to Ctrl-Z.
    Sms,
}

/// The simulated modem's UART end.
pub struct SimModem {
    power: SimPower,
    rx: VecDeque<u8>,
    line: Vec<u8>,
    echo: bool,
    data_mode: Option<DataMode>,
    data: Vec<u8>,
    sockets: HashMap<u8, VecDeque<u8>>,
    gnss_on: bool,
    sms_reference: u8,
    commands: Vec<String>,
    messages: Vec<Vec<u8>>,
}

impl SimModem {
    pub fn new(power: SimPower) -> Self {
        SimModem {
            power,
            rx: VecDeque::new(),
            line: Vec::new(),
            echo: true,
            data_mode: None,
            data: Vec::new(),
            sockets: HashMap::new(),
            gnss_on: false,
            sms_reference: 0,
            commands: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Every command received while powered, in order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Bodies submitted with `AT+CMGS`, without the Ctrl-Z.
    pub fn messages(&self) -> &[Vec<u8>] {
        &self.messages
    }

    pub fn is_socket_open(&self, connect_id: u8) -> bool {
        self.sockets.contains_key(&connect_id)
    }

    fn reply(&mut self, text: &str) {
        self.rx.extend(b"\r\n");
        self.rx.extend(text.as_bytes());
        self.rx.extend(b"\r\n");
    }

    fn prompt(&mut self, mode: DataMode) {
        self.rx.extend(b"\r\n> ");
        self.data_mode = Some(mode);
        self.data.clear();
    }

    fn command(&mut self, cmd: String) {
        trace!(%cmd, "sim bg96: command");
        if self.echo {
            self.rx.extend(cmd.as_bytes());
            self.rx.push_back(b'\r');
        }

        let upper = cmd.to_ascii_uppercase();
        match upper.as_str() {
            "AT" => self.reply("OK"),
            "ATE0" => {
                self.echo = false;
                self.reply("OK");
            }
            "ATE1" => {
                self.echo = true;
                self.reply("OK");
            }
            "ATI" => {
                self.reply(INFO);
                self.reply("OK");
            }
            "AT+GSN" => {
                self.reply(IMEI);
                self.reply("OK");
            }
            "AT+CEREG?" => {
                self.reply("+CEREG: 0,1");
                self.reply("OK");
            }
            "AT+QGPS=1" => {
                self.gnss_on = true;
                self.reply("OK");
            }
            "AT+QGPSEND" => {
                self.gnss_on = false;
                self.reply("OK");
            }
            "AT+QGPSLOC=0" if self.gnss_on => {
                self.reply(GNSS_FIX);
                self.reply("OK");
            }
            // Session not active.
            "AT+QGPSLOC=0" => self.reply("+CME ERROR: 505"),
            c if c.starts_with("AT+QCFG=")
                || c.starts_with("AT+CSCS=")
                || c.starts_with("AT+CMGF=")
                || c.starts_with("AT+CGDCONT=")
                || c.starts_with("AT+QIACT=") =>
            {
                self.reply("OK")
            }
            c if c.starts_with("AT+QIOPEN=") => self.open(&cmd),
            c if c.starts_with("AT+QISEND=") => self.send(&cmd),
            c if c.starts_with("AT+QIRD=") => self.read(&cmd),
            c if c.starts_with("AT+QICLOSE=") => {
                match args(&cmd).first().and_then(|id| id.parse::<u8>().ok()) {
                    Some(id) => {
                        self.sockets.remove(&id);
                        self.reply("OK");
                    }
                    None => self.reply("ERROR"),
                }
            }
            c if c.starts_with("AT+CMGS=") => self.prompt(DataMode::Sms),
            _ => self.reply("ERROR"),
        }
        self.commands.push(cmd);
    }

    /// `AT+QIOPEN=<ctx>,<id>,"TCP",...`: OK, then the open result as a URC.
    fn open(&mut self, cmd: &str) {
        let Some(id) = args(cmd).get(1).and_then(|id| id.parse::<u8>().ok()) else {
            return self.reply("ERROR");
        };
        self.sockets.insert(id, VecDeque::new());
        self.reply("OK");
        self.reply(&format!("+QIOPEN: {},0", id));
    }

    fn send(&mut self, cmd: &str) {
        let args = args(cmd);
        let id = args.first().and_then(|id| id.parse::<u8>().ok());
        let len = args.get(1).and_then(|len| len.parse::<usize>().ok());
        match (id, len) {
            (Some(connect_id), Some(len)) if self.is_socket_open(connect_id) && len > 0 => {
                self.prompt(DataMode::Socket { connect_id, len })
            }
            _ => self.reply("ERROR"),
        }
    }

    fn read(&mut self, cmd: &str) {
        let args = args(cmd);
        let id = args.first().and_then(|id| id.parse::<u8>().ok());
        let max = args.get(1).and_then(|len| len.parse::<usize>().ok()).unwrap_or(1500);
        let Some(buffer) = id.and_then(|id| self.sockets.get_mut(&id)) else {
            return self.reply("ERROR");
        };
        let n = max.min(buffer.len());
        let data: Vec<u8> = buffer.drain(..n).collect();
        self.reply(&format!("+QIRD: {}", n));
        if n > 0 {
            self.rx.extend(data);
            self.rx.extend(b"\r\n");
        }
        self.reply("OK");
    }

    fn data_byte(&mut self, byte: u8) {
        let Some(mode) = self.data_mode else { return };
        match mode {
            DataMode::Socket { connect_id, len } => {
                self.data.push(byte);
                if self.data.len() == len {
                    self.data_mode = None;
                    let data = std::mem::take(&mut self.data);
                    if let Some(buffer) = self.sockets.get_mut(&connect_id) {
                        // Echo server on the far end.
                        buffer.extend(data);
                    }
                    self.reply("SEND OK");
                    self.reply(&format!("+QIURC: \"recv\",{}", connect_id));
                }
            }
            DataMode::Sms if byte == SUB => {
                self.data_mode = None;
                self.messages.push(std::mem::take(&mut self.data));
                self.sms_reference = self.sms_reference.wrapping_add(1);
                let reference = self.sms_reference;
                self.reply(&format!("+CMGS: {}", reference));
                self.reply("OK");
            }
            DataMode::Sms => self.data.push(byte),
        }
    }
}

/// Comma-separated arguments after `=`, quotes stripped.
fn args(cmd: &str) -> Vec<&str> {
    cmd.split_once('=')
        .map(|(_, rest)| rest.split(',').map(|a| a.trim_matches('"')).collect())
        .unwrap_or_default()
}

impl embedded_io::ErrorType for SimModem {
    type Error = Infallible;
}

impl embedded_io::Read for SimModem {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let mut n = 0;
        while n < buf.len() {
            let Some(byte) = self.rx.pop_front() else { break };
            buf[n] = byte;
            n += 1;
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for SimModem {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.rx.is_empty())
    }
}

impl embedded_io::Write for SimModem {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        if !self.power.is_on() {
            return Ok(buf.len());
        }
        for &byte in buf {
            if self.data_mode.is_some() {
                self.data_byte(byte);
            } else if byte == b'\r' {
                let line = std::mem::take(&mut self.line);
                self.command(String::from_utf8_lossy(&line).into_owned());
            } else if byte != b'\n' {
                self.line.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    fn drain(modem: &mut SimModem) -> String {
        let mut buf = [0u8; 512];
        let n = Read::read(modem, &mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_powered_off_modem_is_silent() {
        let mut modem = SimModem::new(SimPower::new(false));
        modem.write(b"AT\r").unwrap();
        assert_eq!(drain(&mut modem), "");
        assert!(modem.commands().is_empty());
    }

    #[test]
    fn test_echo_and_reply() {
        let mut modem = SimModem::new(SimPower::new(true));
        modem.write(b"AT+GSN\r").unwrap();
        assert_eq!(drain(&mut modem), "AT+GSN\r\r\n866425031234567\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_socket_loopback() {
        let mut modem = SimModem::new(SimPower::new(true));
        modem.write(b"ATE0\r").unwrap();
        modem.write(b"AT+QIOPEN=1,0,\"TCP\",\"echo.example.net\",7,0,0\r").unwrap();
        modem.write(b"AT+QISEND=0,4\r").unwrap();
        modem.write(b"ping").unwrap();
        drain(&mut modem);

        modem.write(b"AT+QIRD=0,1500\r").unwrap();
        assert_eq!(drain(&mut modem), "\r\n+QIRD: 4\r\nping\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_sms_until_ctrl_z() {
        let mut modem = SimModem::new(SimPower::new(true));
        modem.write(b"ATE0\r").unwrap();
        modem.write(b"AT+CMGS=23\r").unwrap();
        modem.write(b"0011\x1A").unwrap();
        assert_eq!(modem.messages(), &[b"0011".to_vec()]);
        assert!(drain(&mut modem).ends_with("\r\n+CMGS: 1\r\n\r\nOK\r\n"));
    }

    #[test]
    fn test_pwrkey_toggles_power() {
        use embedded_hal::digital::{InputPin, OutputPin};
        let power = SimPower::new(false);
        let mut key = SimPwrKey::new(power.clone());
        let mut status = SimStatus::new(power.clone());
        key.set_low().unwrap();
        assert!(!status.is_high().unwrap());
        key.set_high().unwrap();
        key.set_low().unwrap();
        assert!(status.is_high().unwrap());
    }
}
