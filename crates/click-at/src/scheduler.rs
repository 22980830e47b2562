//! Command queue and scheduler.
//!
//! The scheduler owns a fixed-capacity FIFO of [`AtCommand`]s and the
//! [`AtOutput`] of the running sequence. Once started it drains the queue one
//! command at a time: the next command is only sent after the previous one
//! finished or timed out.
//!
//! The first failing command ends the sequence: the rest of the queue is
//! dropped, the output goes to [`Status::Fail`] and the scheduler is ready for
//! a new sequence. A sequence whose commands all finish cleanly ends in
//! [`Status::Ok`].

use embedded_io::{Read, ReadReady, Write};
use heapless::Deque;

use crate::command::AtCommand;
use crate::error::{AtError, AtResult};
use crate::events::{EventCallback, EventListeners};
use crate::output::{AtOutput, Status};
use crate::platform::{AtPlatform, PlatformEvent, PlatformState};

/// Command queue capacity.
pub const AT_QUEUE_CAPACITY: usize = 20;

/// Callback for unsolicited result codes.
pub type UrcHandler = Box<dyn FnMut(&str)>;

/// AT session: queue, output object, listeners and the platform driver.
pub struct AtScheduler<U> {
    platform: AtPlatform<U>,
    queue: Deque<AtCommand, AT_QUEUE_CAPACITY>,
    output: AtOutput,
    listeners: EventListeners,
    urc_handler: Option<UrcHandler>,
    running: bool,
    sent: u32,
}

impl<U> AtScheduler<U>
where
    U: Read + Write + ReadReady,
{
    pub fn new(uart: U) -> Self {
        AtScheduler {
            platform: AtPlatform::new(uart),
            queue: Deque::new(),
            output: AtOutput::new(),
            listeners: EventListeners::new(),
            urc_handler: None,
            running: false,
            sent: 0,
        }
    }

    /// Initialise the platform and reset queue and output.
    pub fn init(&mut self) {
        self.platform.init();
        self.queue.clear();
        self.output.reset();
        self.running = false;
    }

    /// Append a command. Fails with [`AtError::QueueFull`] without touching the queue.
    pub fn add_cmd_to_q(&mut self, cmd: AtCommand) -> AtResult<()> {
        let text_len = cmd.text().len();
        self.queue.push_back(cmd).map_err(|rejected| {
            log::warn!("at: command queue is full, dropping {:?}", rejected.text());
            AtError::QueueFull
        })?;
        log::trace!("at: queued command ({} chars), {} in queue", text_len, self.queue.len());
        Ok(())
    }

    /// Start draining the queue.
    pub fn start_scheduler(&mut self) -> AtResult<()> {
        if self.platform.state() == PlatformState::NotInitialized {
            return Err(AtError::NotInitialized);
        }
        if self.running {
            return Err(AtError::Busy);
        }
        if self.queue.is_empty() {
            return Err(AtError::InvalidParameter);
        }
        log::debug!("at: scheduler started with {} commands", self.queue.len());
        // A new sequence never inherits the previous one's error or data.
        self.output.reset();
        self.output.set_status(Status::Busy);
        self.running = true;
        Ok(())
    }

    /// One unit of work: send the next command, or advance the in-flight one.
    pub fn process(&mut self, now_ms: u64) {
        if self.running && self.platform.state() == PlatformState::Ready {
            match self.queue.pop_front() {
                Some(cmd) => {
                    if let Err(err) = self.platform.send_cmd(cmd, now_ms) {
                        self.abort(err);
                    } else {
                        self.sent += 1;
                    }
                }
                None => self.complete(),
            }
        } else {
            match self.platform.process(now_ms, &mut self.output) {
                Ok(PlatformEvent::Idle) => {}
                Ok(PlatformEvent::Completed) => self.command_done(),
                Ok(PlatformEvent::TimedOut) => {
                    self.output.report_error(AtError::Timeout);
                    self.command_done();
                }
                Ok(PlatformEvent::Unsolicited(line)) => self.unsolicited(&line),
                Err(err) => self.abort(err),
            }
        }
        self.listeners.process(&self.output, now_ms);
    }

    fn command_done(&mut self) {
        if !self.running {
            return;
        }
        if let Some(err) = self.output.error() {
            self.abort(err);
        } else if self.queue.is_empty() {
            self.complete();
        }
    }

    fn complete(&mut self) {
        log::debug!("at: sequence complete");
        self.running = false;
        self.output.set_status(Status::Ok);
    }

    fn abort(&mut self, err: AtError) {
        log::warn!("at: sequence aborted: {} ({} commands dropped)", err, self.queue.len());
        self.platform.finish_cmd();
        self.queue.clear();
        self.output.report_error(err);
        self.output.set_status(Status::Fail);
        self.running = false;
    }

    fn unsolicited(&mut self, line: &str) {
        log::debug!("at: urc {:?}", line);
        if let Some(handler) = self.urc_handler.as_mut() {
            handler(line);
        }
    }

    /// Drop every queued command that has not been sent yet.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Register a completion listener on the output status.
    pub fn listen(&mut self, expected: Status, timeout_ms: u32, now_ms: u64, callback: EventCallback) {
        self.listeners.listen(expected, timeout_ms, now_ms, callback);
    }

    /// Install the handler for lines that arrive with no command in flight.
    pub fn set_urc_handler(&mut self, handler: UrcHandler) {
        self.urc_handler = Some(handler);
    }

    pub fn output(&self) -> &AtOutput {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut AtOutput {
        &mut self.output
    }

    /// True while a sequence is being drained.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Texts of the queued commands, front first.
    pub fn queued_texts(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(AtCommand::text)
    }

    pub fn platform_state(&self) -> PlatformState {
        self.platform.state()
    }

    /// Commands written to the UART since creation.
    pub fn commands_sent(&self) -> u32 {
        self.sent
    }

    pub fn uart_mut(&mut self) -> &mut U {
        self.platform.uart_mut()
    }
}
