//! AT command descriptors.
//!
//! A descriptor holds the command text, the handler that interprets the
//! response lines, and the response timeout. Commands that carry runtime data
//! (phone numbers, socket addresses) are assembled with repeated
//! [`AtCommand::extend`] calls, each checked against the fixed text capacity.
//!
//! Commands that enter data mode (`AT+QISEND`, `AT+CMGS`) also carry a
//! payload which the platform writes after the modem's `"> "` prompt.

use crate::error::{AtError, AtResult};
use crate::output::AtOutput;

/// Size of the command text buffer, including one byte reserved for the terminator.
pub const AT_CMD_MAX_LEN: usize = 300;

/// Maximum length of a data-mode payload (socket data or hex-rendered SMS PDU).
pub const AT_PAYLOAD_MAX_LEN: usize = 1024;

/// Default response timeout for short configuration commands.
pub const AT_DEFAULT_TIMEOUT_MS: u32 = 300;

/// What a response handler wants the platform to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep waiting for more lines.
    Continue,
    /// The modem prompted for data: write the command payload.
    SendPayload,
    /// The command is complete (successfully or not).
    Finish,
}

/// One framed line handed to a response handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Line text without terminators.
    pub text: &'a str,
    /// 1-based line number within the current command.
    pub number: u8,
    /// True for the data-mode `"> "` prompt.
    pub prompt: bool,
}

impl<'a> Line<'a> {
    /// Plain `OK` final result code.
    pub fn is_ok(&self) -> bool {
        self.text == "OK"
    }

    /// `ERROR`, `+CME ERROR: <n>` or `+CMS ERROR: <n>`.
    pub fn is_error(&self) -> bool {
        self.text == "ERROR"
            || self.text.starts_with("+CME ERROR")
            || self.text.starts_with("+CMS ERROR")
    }

    /// Value after `<prefix>: `, if the line carries that prefix.
    pub fn value_of(&self, prefix: &str) -> Option<&'a str> {
        self.text
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
    }
}

/// Response handler.
///
/// Called once per framed line while the command is in flight. `None` is the
/// timeout sentinel: the handler is called with it exactly once when the
/// command's window elapses and should report [`AtError::Timeout`].
pub type ResponseHandler = fn(Option<&Line<'_>>, &mut AtOutput) -> Step;

/// A single AT command ready to be queued.
#[derive(Debug, Clone)]
pub struct AtCommand {
    text: heapless::String<AT_CMD_MAX_LEN>,
    payload: heapless::Vec<u8, AT_PAYLOAD_MAX_LEN>,
    handler: ResponseHandler,
    timeout_ms: u32,
}

impl AtCommand {
    /// Create a command from its initial text.
    pub fn new(text: &str, handler: ResponseHandler, timeout_ms: u32) -> AtResult<Self> {
        let mut cmd = AtCommand {
            text: heapless::String::new(),
            payload: heapless::Vec::new(),
            handler,
            timeout_ms,
        };
        cmd.extend(text)?;
        Ok(cmd)
    }

    /// Append a fragment to the command text.
    ///
    /// Fails with [`AtError::InvalidParameter`] if the text would exceed
    /// `AT_CMD_MAX_LEN - 1` characters; the text is left unchanged in that case.
    pub fn extend(&mut self, fragment: &str) -> AtResult<()> {
        let new_len = self.text.len() + fragment.len();
        if new_len > AT_CMD_MAX_LEN - 1 {
            log::warn!(
                "at: command would overflow ({} > {} chars)",
                new_len,
                AT_CMD_MAX_LEN - 1
            );
            return Err(AtError::InvalidParameter);
        }
        self.text
            .push_str(fragment)
            .map_err(|_| AtError::InvalidParameter)
    }

    /// Append a number rendered in decimal.
    pub fn extend_num(&mut self, value: u32) -> AtResult<()> {
        let mut digits: heapless::String<10> = heapless::String::new();
        core::fmt::Write::write_fmt(&mut digits, format_args!("{}", value))
            .map_err(|_| AtError::InvalidParameter)?;
        self.extend(&digits)
    }

    /// Append a fragment wrapped in double quotes.
    pub fn extend_quoted(&mut self, fragment: &str) -> AtResult<()> {
        if fragment.contains('"') {
            return Err(AtError::InvalidParameter);
        }
        if self.text.len() + fragment.len() + 2 > AT_CMD_MAX_LEN - 1 {
            return Err(AtError::InvalidParameter);
        }
        self.extend("\"")?;
        self.extend(fragment)?;
        self.extend("\"")
    }

    /// Reset the text and payload so the descriptor can be reassembled.
    pub fn clear(&mut self) {
        self.text.clear();
        self.payload.clear();
    }

    /// Set the data-mode payload, replacing any previous one.
    pub fn set_payload(&mut self, data: &[u8]) -> AtResult<()> {
        if data.len() > AT_PAYLOAD_MAX_LEN {
            return Err(AtError::BufferOverflow {
                max: AT_PAYLOAD_MAX_LEN,
                actual: data.len(),
            });
        }
        self.payload.clear();
        self.payload
            .extend_from_slice(data)
            .map_err(|_| AtError::InvalidParameter)
    }

    /// Command text without the `\r` terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Data-mode payload (empty for ordinary commands).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The response handler.
    pub fn handler(&self) -> ResponseHandler {
        self.handler
    }

    /// Response timeout in milliseconds.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}
