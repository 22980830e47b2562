//! Platform driver: the half-duplex UART side of the AT channel.
//!
//! ```text
//! NotInitialized --init--> Ready --send_cmd--> Transmit --finish/timeout--> Ready
//! ```
//!
//! Exactly one command is in flight at a time. Every call to
//! [`AtPlatform::process`] reads at most one byte, so the caller's super-loop
//! stays responsive.

use embedded_io::{Read, ReadReady, Write};

use crate::codec::{Frame, LineReader};
use crate::command::{AtCommand, Line, Step, AT_CMD_MAX_LEN};
use crate::error::{AtError, AtResult};
use crate::output::AtOutput;
use crate::timer::OneShotTimer;

/// Platform driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformState {
    NotInitialized,
    Ready,
    Transmit,
}

/// Result of one [`AtPlatform::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Nothing completed.
    Idle,
    /// The in-flight command's handler returned [`Step::Finish`].
    Completed,
    /// The in-flight command timed out; its handler saw the `None` sentinel.
    TimedOut,
    /// A line arrived while no command was in flight.
    Unsolicited(String),
}

/// UART-facing AT driver.
pub struct AtPlatform<U> {
    uart: U,
    state: PlatformState,
    reader: LineReader,
    timer: OneShotTimer,
    current: Option<AtCommand>,
    line_count: u8,
}

impl<U> AtPlatform<U>
where
    U: Read + Write + ReadReady,
{
    pub fn new(uart: U) -> Self {
        AtPlatform {
            uart,
            state: PlatformState::NotInitialized,
            reader: LineReader::new(),
            timer: OneShotTimer::new(),
            current: None,
            line_count: 0,
        }
    }

    /// Move to `Ready`, dropping any command and partial line.
    pub fn init(&mut self) {
        self.reader.clear();
        self.timer.stop();
        self.current = None;
        self.line_count = 0;
        self.state = PlatformState::Ready;
        log::debug!("at: platform ready");
    }

    pub fn state(&self) -> PlatformState {
        self.state
    }

    /// Access the UART.
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Transmit a command and start its response timer.
    pub fn send_cmd(&mut self, cmd: AtCommand, now_ms: u64) -> AtResult<()> {
        match self.state {
            PlatformState::NotInitialized => return Err(AtError::NotInitialized),
            PlatformState::Transmit => return Err(AtError::Busy),
            PlatformState::Ready => {}
        }
        if cmd.text().is_empty() || cmd.text().len() + 1 > AT_CMD_MAX_LEN {
            return Err(AtError::InvalidParameter);
        }

        self.reader.set_last_command(cmd.text())?;
        log::debug!("at: -> {:?} (timeout {} ms)", cmd.text(), cmd.timeout_ms());
        self.write_all(&LineReader::encode_command(cmd.text()))?;

        self.line_count = 0;
        self.timer.start(now_ms, cmd.timeout_ms());
        self.current = Some(cmd);
        self.state = PlatformState::Transmit;
        Ok(())
    }

    /// Complete the in-flight command and return to `Ready`.
    pub fn finish_cmd(&mut self) {
        self.timer.stop();
        self.current = None;
        self.reader.clear_echo();
        if self.state == PlatformState::Transmit {
            self.state = PlatformState::Ready;
        }
    }

    /// Do one unit of work: check the timeout, then read at most one byte.
    pub fn process(&mut self, now_ms: u64, output: &mut AtOutput) -> AtResult<PlatformEvent> {
        if self.state == PlatformState::NotInitialized {
            return Ok(PlatformEvent::Idle);
        }

        if self.state == PlatformState::Transmit && self.timer.poll(now_ms) {
            if let Some(cmd) = self.current.as_ref() {
                log::warn!("at: timeout waiting for {:?}", cmd.text());
                let handler = cmd.handler();
                handler(None, output);
            }
            self.finish_cmd();
            return Ok(PlatformEvent::TimedOut);
        }

        if !self.uart.read_ready().map_err(|_| AtError::Io)? {
            return Ok(PlatformEvent::Idle);
        }
        let mut byte = [0u8; 1];
        if self.uart.read(&mut byte).map_err(|_| AtError::Io)? == 0 {
            return Ok(PlatformEvent::Idle);
        }

        match self.reader.push(byte[0]) {
            Some(frame) => self.dispatch(frame, output),
            None => Ok(PlatformEvent::Idle),
        }
    }

    fn dispatch(&mut self, frame: Frame, output: &mut AtOutput) -> AtResult<PlatformEvent> {
        let Some(cmd) = self.current.as_ref() else {
            return Ok(match frame {
                Frame::Prompt => PlatformEvent::Idle,
                Frame::Line(text) | Frame::Overflow(text) => PlatformEvent::Unsolicited(text),
            });
        };

        self.line_count = self.line_count.saturating_add(1);
        let line = Line {
            text: frame.text(),
            number: self.line_count,
            prompt: frame == Frame::Prompt,
        };
        let handler = cmd.handler();
        match handler(Some(&line), output) {
            Step::Continue => Ok(PlatformEvent::Idle),
            Step::SendPayload => {
                let payload = cmd.payload().to_vec();
                log::debug!("at: -> payload ({} bytes)", payload.len());
                self.write_all(&payload)?;
                Ok(PlatformEvent::Idle)
            }
            Step::Finish => {
                self.finish_cmd();
                Ok(PlatformEvent::Completed)
            }
        }
    }

    fn write_all(&mut self, mut data: &[u8]) -> AtResult<()> {
        while !data.is_empty() {
            let written = self.uart.write(data).map_err(|_| AtError::Io)?;
            if written == 0 {
                return Err(AtError::Io);
            }
            data = &data[written..];
        }
        self.uart.flush().map_err(|_| AtError::Io)
    }
}
