//! Generic response handlers shared by most commands.

use crate::command::{Line, Step};
use crate::error::AtError;
use crate::output::AtOutput;

/// Finish on `OK`, fail on an error result code, ignore everything else.
pub fn ok_error(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        output.report_error(AtError::Timeout);
        return Step::Finish;
    };
    if line.is_ok() {
        Step::Finish
    } else if line.is_error() {
        log::debug!("at: device error {:?}", line.text);
        output.report_error(AtError::Fail);
        Step::Finish
    } else {
        Step::Continue
    }
}

/// Store every intermediate line as response data; finish on `OK`.
pub fn collect_data(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    let Some(line) = line else {
        output.report_error(AtError::Timeout);
        return Step::Finish;
    };
    if line.is_ok() || line.is_error() {
        return ok_error(Some(line), output);
    }
    if let Err(err) = output.report_data(line.text) {
        output.report_error(err);
    }
    Step::Continue
}

/// Write the payload on the `"> "` prompt; finish on `OK` or `SEND OK`.
pub fn prompt_payload(line: Option<&Line<'_>>, output: &mut AtOutput) -> Step {
    match line {
        Some(line) if line.prompt => Step::SendPayload,
        Some(line) if line.text == "SEND OK" => Step::Finish,
        Some(line) if line.text == "SEND FAIL" => {
            output.report_error(AtError::Fail);
            Step::Finish
        }
        other => ok_error(other, output),
    }
}
