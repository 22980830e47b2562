//! End-to-end tests for the `Bg96` session against a scripted modem.

use click_at::{AtError, AtOutput, Status};
use click_bg96::{Bg96, Bg96Config, PowerState, Service, Socket};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

const GNSS_FIX: &str =
    "+QGPSLOC: 013828.0,3150.7223N,11711.9293E,0.7,62.2,2,0.00,0.0,0.0,130817,09";

enum DataMode {
    Fixed(usize, &'static str),
    UntilSub(&'static str),
}

#[derive(Default)]
struct Modem {
    rx: VecDeque<u8>,
    line: Vec<u8>,
    commands: Vec<String>,
    payloads: Vec<Vec<u8>>,
    data_mode: Option<DataMode>,
    payload: Vec<u8>,
}

impl Modem {
    fn command(&mut self, cmd: String) {
        let reply = match cmd.as_str() {
            "AT+GSN" => "\r\n866425031234567\r\n\r\nOK\r\n",
            "AT+CEREG?" => "\r\n+CEREG: 0,1\r\n\r\nOK\r\n",
            "AT+QGPSLOC=0" => "\r\n+QGPSLOC: 013828.0,3150.7223N,11711.9293E,0.7,62.2,2,0.00,0.0,0.0,130817,09\r\n\r\nOK\r\n",
            "AT+CMGF=1" => "\r\nERROR\r\n",
            c if c.starts_with("AT+QIOPEN=") => "\r\nOK\r\n\r\n+QIOPEN: 0,0\r\n",
            c if c.starts_with("AT+QISEND=") => {
                let len = c.rsplit(',').next().and_then(|l| l.parse().ok()).unwrap_or(0);
                self.data_mode = Some(DataMode::Fixed(len, "\r\nSEND OK\r\n"));
                "\r\n> "
            }
            c if c.starts_with("AT+CMGS=") => {
                self.data_mode = Some(DataMode::UntilSub("\r\n+CMGS: 42\r\n\r\nOK\r\n"));
                "\r\n> "
            }
            _ => "\r\nOK\r\n",
        };
        self.rx.extend(reply.as_bytes());
        self.commands.push(cmd);
    }

    fn data_byte(&mut self, byte: u8) {
        self.payload.push(byte);
        let done = match self.data_mode {
            Some(DataMode::Fixed(len, reply)) if self.payload.len() == len => Some(reply),
            Some(DataMode::UntilSub(reply)) if byte == 0x1A => Some(reply),
            _ => None,
        };
        if let Some(reply) = done {
            self.data_mode = None;
            self.payloads.push(std::mem::take(&mut self.payload));
            self.rx.extend(reply.as_bytes());
        }
    }
}

#[derive(Clone, Default)]
struct Uart(Rc<RefCell<Modem>>);

impl embedded_io::ErrorType for Uart {
    type Error = Infallible;
}

impl embedded_io::Read for Uart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let mut modem = self.0.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            let Some(b) = modem.rx.pop_front() else { break };
            buf[n] = b;
            n += 1;
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for Uart {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for Uart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        let mut modem = self.0.borrow_mut();
        for &b in buf {
            if modem.data_mode.is_some() {
                modem.data_byte(b);
            } else if b == b'\r' {
                let cmd = String::from_utf8(std::mem::take(&mut modem.line)).unwrap();
                modem.command(cmd);
            } else {
                modem.line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// STATUS level shared between the two pins.
#[derive(Clone, Default)]
struct Power {
    alive: Rc<Cell<bool>>,
    pulses: Rc<Cell<u32>>,
}

/// PWRKEY: releasing a held key toggles the module's power.
struct PwrKey {
    power: Power,
    held: bool,
}

impl embedded_hal::digital::ErrorType for PwrKey {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for PwrKey {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.held {
            self.power.alive.set(!self.power.alive.get());
            self.power.pulses.set(self.power.pulses.get() + 1);
        }
        self.held = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.held = true;
        Ok(())
    }
}

struct StatusPin(Power);

impl embedded_hal::digital::ErrorType for StatusPin {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for StatusPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.alive.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.alive.get())
    }
}

type Session = Bg96<Uart, PwrKey, StatusPin>;

fn session(alive: bool) -> (Session, Uart, Power) {
    let uart = Uart::default();
    let power = Power::default();
    power.alive.set(alive);
    let pwrkey = PwrKey {
        power: power.clone(),
        held: false,
    };
    let mut bg96 = Bg96::new(uart.clone(), pwrkey, StatusPin(power.clone()), Bg96Config::default());
    bg96.init();
    (bg96, uart, power)
}

fn run(bg96: &mut Session, start_ms: u64) -> u64 {
    let mut now = start_ms;
    while !bg96.is_idle() && now < start_ms + 200_000 {
        bg96.process(now);
        now += 1;
    }
    bg96.process(now);
    now
}

#[test]
fn test_wake_up_already_alive_is_immediate() {
    let (mut bg96, _uart, power) = session(true);
    bg96.wake_up(0).unwrap();
    assert_eq!(bg96.output().status(), Status::Ok);
    assert_eq!(bg96.power_state(), PowerState::Ready);
    assert_eq!(power.pulses.get(), 0);
}

#[test]
fn test_wake_up_then_sleep() {
    let (mut bg96, _uart, power) = session(false);

    bg96.wake_up(0).unwrap();
    assert_eq!(bg96.output().status(), Status::Busy);
    assert_eq!(bg96.read_imei(), Err(AtError::Busy));
    let now = run(&mut bg96, 0);
    assert_eq!(bg96.output().status(), Status::Ok);
    assert!(power.alive.get());
    assert!(now >= 1_000);

    bg96.sleep(now).unwrap();
    run(&mut bg96, now);
    assert_eq!(bg96.output().status(), Status::Ok);
    assert!(!power.alive.get());
    assert_eq!(power.pulses.get(), 2);
}

#[test]
fn test_read_imei_with_listener() {
    let (mut bg96, _uart, _power) = session(true);
    let imei = Rc::new(RefCell::new(String::new()));
    let slot = imei.clone();

    bg96.read_imei().unwrap();
    bg96.on_complete(
        0,
        0,
        Box::new(move |output: &AtOutput| *slot.borrow_mut() = output.data().to_string()),
    );
    run(&mut bg96, 0);
    assert_eq!(imei.borrow().as_str(), "866425031234567");
}

#[test]
fn test_registration_query() {
    let (mut bg96, _uart, _power) = session(true);
    bg96.network_registration().unwrap();
    run(&mut bg96, 0);
    assert!(bg96.registration().unwrap().status.is_registered());
}

#[test]
fn test_socket_open_send_close() {
    let (mut bg96, uart, _power) = session(true);
    let socket = Socket {
        connect_id: 0,
        service: Service::Tcp,
        remote: "echo.example.net",
        port: 7,
    };

    bg96.open_connection(&socket).unwrap();
    let now = run(&mut bg96, 0);
    assert_eq!(bg96.output().status(), Status::Ok);
    assert_eq!(bg96.output().data(), "0,0");

    bg96.send_data(0, b"ping").unwrap();
    let now = run(&mut bg96, now);
    assert_eq!(bg96.output().status(), Status::Ok);

    bg96.close_connection(0).unwrap();
    run(&mut bg96, now);
    assert_eq!(bg96.output().status(), Status::Ok);

    let modem = uart.0.borrow();
    assert_eq!(
        modem.commands,
        vec![
            "AT+QIOPEN=1,0,\"TCP\",\"echo.example.net\",7,0,0".to_string(),
            "AT+QISEND=0,4".to_string(),
            "AT+QICLOSE=0".to_string(),
        ]
    );
    assert_eq!(modem.payloads, vec![b"ping".to_vec()]);
}

#[test]
fn test_sms_pdu_sequence() {
    let (mut bg96, uart, _power) = session(true);
    bg96.send_sms_pdu("+46708251358", "hellohello").unwrap();
    run(&mut bg96, 0);

    assert_eq!(bg96.output().status(), Status::Ok);
    assert_eq!(bg96.output().data(), "42");
    let modem = uart.0.borrow();
    assert_eq!(modem.commands, vec!["AT+CMGF=0".to_string(), "AT+CMGS=23".to_string()]);
    assert_eq!(
        modem.payloads,
        vec![b"0011000B916407281553F80000AA0AE8329BFD4697D9EC37\x1A".to_vec()]
    );
}

#[test]
fn test_sms_text_aborts_on_error() {
    let (mut bg96, uart, _power) = session(true);
    bg96.send_sms_text("+36301234567", "hi").unwrap();
    run(&mut bg96, 0);

    assert_eq!(bg96.output().status(), Status::Fail);
    assert_eq!(bg96.output().error(), Some(AtError::Fail));
    // AT+CMGS never went out.
    assert_eq!(
        uart.0.borrow().commands,
        vec!["AT+CSCS=\"GSM\"".to_string(), "AT+CMGF=1".to_string()]
    );
    assert!(bg96.is_idle());
}

#[test]
fn test_gnss_position() {
    let (mut bg96, _uart, _power) = session(true);
    bg96.gnss_get_position().unwrap();
    run(&mut bg96, 0);

    assert_eq!(bg96.output().data(), GNSS_FIX);
    let position = bg96.position().unwrap();
    assert!((position.latitude - 31.845372).abs() < 1e-5);
    assert_eq!(position.satellites, 9);
}

#[test]
fn test_invalid_build_queues_nothing() {
    let (mut bg96, uart, _power) = session(true);
    assert_eq!(bg96.send_sms_pdu("+4670", "€uro"), Err(AtError::InvalidParameter));
    assert!(bg96.is_idle());
    bg96.process(0);
    assert!(uart.0.borrow().commands.is_empty());
}
