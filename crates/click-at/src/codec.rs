//! Line framing for the AT command channel.
//!
//! The modem answers with ASCII lines terminated by `\r` and/or `\n`. Two
//! other frames matter to the scheduler:
//!
//! - the data-mode prompt `"> "`, which is sent without a line terminator
//! - a forced flush when a line does not fit the fixed receive buffer
//!
//! With echo enabled (`ATE1`) the modem repeats every command before the
//! response; the reader drops those bytes so handlers only see responses.

use heapless::Vec;

use crate::command::AT_CMD_MAX_LEN;
use crate::error::{AtError, AtResult};

/// Receive buffer size for one line.
pub const LINE_BUFFER_LEN: usize = 256;

/// Data-mode prompt sent by the modem.
pub const PROMPT: &[u8] = b"> ";

/// Command terminator.
pub const CR: u8 = b'\r';

/// SUB character that ends a text-mode SMS body.
pub const CTRL_Z: u8 = 0x1A;

/// A complete frame produced by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A terminated line.
    Line(String),
    /// The `"> "` data-mode prompt.
    Prompt,
    /// The buffer filled up before a terminator arrived.
    Overflow(String),
}

impl Frame {
    /// Text carried by the frame (the prompt maps to `"> "`).
    pub fn text(&self) -> &str {
        match self {
            Frame::Line(text) | Frame::Overflow(text) => text,
            Frame::Prompt => "> ",
        }
    }
}

/// Byte-at-a-time line reader.
#[derive(Debug, Default)]
pub struct LineReader {
    /// Accumulated bytes of the current line.
    buffer: Vec<u8, LINE_BUFFER_LEN>,
    /// Whether we're currently receiving echo characters.
    in_echo: bool,
    /// The last command sent (for echo filtering).
    last_command: Vec<u8, AT_CMD_MAX_LEN>,
    /// Position in the last command for echo matching.
    echo_pos: usize,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command just sent so its echo can be dropped.
    ///
    /// Fails with [`AtError::BufferOverflow`] for text longer than any
    /// [`AtCommand`](crate::AtCommand) can hold; echo filtering is then off.
    pub fn set_last_command(&mut self, cmd: &str) -> AtResult<()> {
        self.clear_echo();
        self.last_command
            .extend_from_slice(cmd.as_bytes())
            .map_err(|_| AtError::BufferOverflow {
                max: AT_CMD_MAX_LEN,
                actual: cmd.len(),
            })?;
        self.echo_pos = 0;
        self.in_echo = true;
        Ok(())
    }

    /// Stop echo filtering.
    pub fn clear_echo(&mut self) {
        self.last_command.clear();
        self.echo_pos = 0;
        self.in_echo = false;
    }

    /// Feed one received byte.
    ///
    /// Returns a frame when the byte completes one.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        if self.in_echo && self.buffer.is_empty() && self.filter_echo(byte) {
            return None;
        }

        if byte == b'\r' || byte == b'\n' {
            if self.buffer.is_empty() {
                return None;
            }
            let line = self.take_text();
            log::trace!("at: <- {:?}", line);
            return Some(Frame::Line(line));
        }

        // The buffer is flushed as soon as it fills, so there is always room here.
        let _ = self.buffer.push(byte);

        if self.buffer.as_slice() == PROMPT {
            self.buffer.clear();
            log::trace!("at: <- prompt");
            return Some(Frame::Prompt);
        }

        if self.buffer.is_full() {
            let line = self.take_text();
            log::warn!("at: line overflow after {} bytes", LINE_BUFFER_LEN);
            return Some(Frame::Overflow(line));
        }

        None
    }

    /// Echo matching. Returns true when the byte was part of the echo.
    fn filter_echo(&mut self, byte: u8) -> bool {
        let cmd_len = self.last_command.len();
        if self.echo_pos < cmd_len && byte == self.last_command[self.echo_pos] {
            self.echo_pos += 1;
            return true;
        }
        // The final \r echo
        if self.echo_pos == cmd_len && byte == b'\r' {
            self.echo_pos += 1;
            return true;
        }
        // The \n after the echoed \r
        if self.echo_pos == cmd_len + 1 && byte == b'\n' {
            self.in_echo = false;
            return true;
        }
        if self.echo_pos > 0 && self.echo_pos < cmd_len {
            // Partial echo followed by something else: restore what we swallowed,
            // up to what the line buffer holds.
            let swallowed = self.echo_pos.min(LINE_BUFFER_LEN - 1);
            let _ = self
                .buffer
                .extend_from_slice(&self.last_command[..swallowed]);
        }
        // Not an echo character, stop echo mode
        self.in_echo = false;
        false
    }

    fn take_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        text
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> std::vec::Vec<u8> {
        let mut buf = std::vec::Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(CR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line and echo state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.clear_echo();
    }
}
