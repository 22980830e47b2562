//! Result object written by the scheduler and read by the caller.

use crate::error::{AtError, AtResult};

/// Capacity of the response-data buffer.
pub const AT_OUTPUT_DATA_LEN: usize = 1024;

/// Progress of a command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// No sequence started since the last reset.
    #[default]
    NotInitialized,
    /// A sequence is in progress.
    Busy,
    /// Every command in the sequence completed.
    Ok,
    /// The sequence stopped on an error; see [`AtOutput::error`].
    Fail,
}

/// The single live result of a command sequence.
///
/// Handlers append response data and report errors; the scheduler owns the
/// status transitions.
#[derive(Debug, Clone, Default)]
pub struct AtOutput {
    status: Status,
    error: Option<AtError>,
    data: heapless::String<AT_OUTPUT_DATA_LEN>,
}

impl AtOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to `NotInitialized` with no error and no data.
    pub fn reset(&mut self) {
        self.status = Status::NotInitialized;
        self.error = None;
        self.data.clear();
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// The first error reported during the sequence.
    pub fn error(&self) -> Option<AtError> {
        self.error
    }

    /// Collected response data. Multiple reports are separated by `\n`.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Record an error. Later errors do not overwrite the first one.
    pub fn report_error(&mut self, error: AtError) {
        if self.error.is_none() {
            log::debug!("at: output error {:?}", error);
            self.error = Some(error);
        }
    }

    /// Append a piece of response data.
    pub fn report_data(&mut self, text: &str) -> AtResult<()> {
        let sep = usize::from(!self.data.is_empty());
        let needed = self.data.len() + sep + text.len();
        if needed > AT_OUTPUT_DATA_LEN {
            return Err(AtError::BufferOverflow {
                max: AT_OUTPUT_DATA_LEN,
                actual: needed,
            });
        }
        if sep == 1 {
            self.data.push('\n').map_err(|_| AtError::AllocationFailed)?;
        }
        self.data
            .push_str(text)
            .map_err(|_| AtError::AllocationFailed)
    }

    /// True once the sequence has reached `Ok` or `Fail`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Ok | Status::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let mut output = AtOutput::new();
        output.report_error(AtError::Timeout);
        output.report_error(AtError::Fail);
        assert_eq!(output.error(), Some(AtError::Timeout));
    }

    #[test]
    fn test_report_data_joins_lines() {
        let mut output = AtOutput::new();
        output.report_data("Quectel").unwrap();
        output.report_data("BG96").unwrap();
        assert_eq!(output.data(), "Quectel\nBG96");
    }

    #[test]
    fn test_report_data_overflow() {
        let mut output = AtOutput::new();
        let big = "x".repeat(AT_OUTPUT_DATA_LEN);
        output.report_data(&big).unwrap();
        assert!(matches!(
            output.report_data("y"),
            Err(AtError::BufferOverflow { .. })
        ));
        assert_eq!(output.data().len(), AT_OUTPUT_DATA_LEN);
    }

    #[test]
    fn test_reset() {
        let mut output = AtOutput::new();
        output.set_status(Status::Fail);
        output.report_error(AtError::Fail);
        output.report_data("junk").unwrap();
        output.reset();
        assert_eq!(output.status(), Status::NotInitialized);
        assert_eq!(output.error(), None);
        assert_eq!(output.data(), "");
    }
}
