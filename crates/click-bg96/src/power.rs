//! PWRKEY/STATUS wake and sleep sequencing.
//!
//! ```text
//! Ready --wake_up/sleep--> WaitForGpio --pulse elapsed--> WaitForDevice --STATUS matches--> Ready
//!                                                              \--timeout--> Ready (Timeout)
//! ```
//!
//! The sequence runs on its own timers, independent of the AT scheduler.

use click_at::{AtError, AtResult, OneShotTimer, PeriodicTimer};
use embedded_hal::digital::{InputPin, OutputPin};
use tracing::{debug, warn};

use crate::config::Bg96Config;

/// Wake/sleep state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Ready,
    /// PWRKEY is held.
    WaitForGpio,
    /// PWRKEY released; polling STATUS.
    WaitForDevice,
}

/// Outcome of a wake or sleep request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The module was already in the requested state.
    Done,
    /// A PWRKEY pulse was started; completion is reported by [`PowerControl::process`].
    Pending,
}

/// PWRKEY/STATUS driver.
pub struct PowerControl<P, S> {
    pwrkey: P,
    status: S,
    state: PowerState,
    target_alive: bool,
    pulse_ms: u32,
    timeout_ms: u32,
    pulse: OneShotTimer,
    deadline: OneShotTimer,
    poll: PeriodicTimer,
}

impl<P, S> PowerControl<P, S>
where
    P: OutputPin,
    S: InputPin,
{
    pub fn new(pwrkey: P, status: S, config: &Bg96Config) -> Self {
        PowerControl {
            pwrkey,
            status,
            state: PowerState::Ready,
            target_alive: true,
            pulse_ms: config.pwrkey_pulse_ms,
            timeout_ms: config.status_timeout_ms,
            pulse: OneShotTimer::new(),
            deadline: OneShotTimer::new(),
            poll: PeriodicTimer::new(config.status_poll_ms),
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Read the STATUS pin.
    pub fn is_alive(&mut self) -> AtResult<bool> {
        self.status.is_high().map_err(|_| AtError::Io)
    }

    /// Power the module up.
    pub fn wake_up(&mut self, now_ms: u64) -> AtResult<Transition> {
        self.request(true, now_ms)
    }

    /// Power the module down.
    pub fn sleep(&mut self, now_ms: u64) -> AtResult<Transition> {
        self.request(false, now_ms)
    }

    fn request(&mut self, alive: bool, now_ms: u64) -> AtResult<Transition> {
        if self.state != PowerState::Ready {
            return Err(AtError::Busy);
        }
        if self.is_alive()? == alive {
            debug!(alive, "bg96: already in requested power state");
            return Ok(Transition::Done);
        }

        self.pwrkey.set_high().map_err(|_| AtError::Io)?;
        self.target_alive = alive;
        self.pulse.start(now_ms, self.pulse_ms);
        self.state = PowerState::WaitForGpio;
        debug!(alive, pulse_ms = self.pulse_ms, "bg96: PWRKEY pulse started");
        Ok(Transition::Pending)
    }

    /// Advance the sequence. Returns the result once it completes.
    pub fn process(&mut self, now_ms: u64) -> Option<AtResult<()>> {
        match self.state {
            PowerState::Ready => None,
            PowerState::WaitForGpio => {
                if !self.pulse.poll(now_ms) {
                    return None;
                }
                if self.pwrkey.set_low().is_err() {
                    return Some(self.finish(Err(AtError::Io)));
                }
                self.deadline.start(now_ms, self.timeout_ms);
                self.poll.start(now_ms);
                self.state = PowerState::WaitForDevice;
                debug!("bg96: PWRKEY released, waiting for STATUS");
                None
            }
            PowerState::WaitForDevice => {
                if self.poll.poll(now_ms) {
                    match self.is_alive() {
                        Ok(alive) if alive == self.target_alive => {
                            debug!(alive, "bg96: STATUS reached target");
                            return Some(self.finish(Ok(())));
                        }
                        Ok(_) => {}
                        Err(err) => return Some(self.finish(Err(err))),
                    }
                }
                if self.deadline.poll(now_ms) {
                    warn!(target_alive = self.target_alive, "bg96: STATUS timeout");
                    return Some(self.finish(Err(AtError::Timeout)));
                }
                None
            }
        }
    }

    fn finish(&mut self, result: AtResult<()>) -> AtResult<()> {
        self.pulse.stop();
        self.deadline.stop();
        self.poll.stop();
        self.state = PowerState::Ready;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Pin(Rc<Cell<bool>>);

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(true);
            Ok(())
        }
    }

    impl InputPin for Pin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    fn control(alive: bool) -> (PowerControl<Pin, Pin>, Pin, Pin) {
        let pwrkey = Pin::default();
        let status = Pin(Rc::new(Cell::new(alive)));
        let control = PowerControl::new(pwrkey.clone(), status.clone(), &Bg96Config::default());
        (control, pwrkey, status)
    }

    #[test]
    fn test_wake_up_when_alive_is_immediate() {
        let (mut power, pwrkey, _status) = control(true);
        assert_eq!(power.wake_up(0), Ok(Transition::Done));
        assert_eq!(power.state(), PowerState::Ready);
        assert!(!pwrkey.0.get());
        assert_eq!(power.process(100_000), None);
    }

    #[test]
    fn test_wake_up_sequence() {
        let (mut power, pwrkey, status) = control(false);
        assert_eq!(power.wake_up(0), Ok(Transition::Pending));
        assert!(pwrkey.0.get());
        assert_eq!(power.wake_up(10), Err(AtError::Busy));

        assert_eq!(power.process(999), None);
        assert_eq!(power.process(1_000), None);
        assert!(!pwrkey.0.get());
        assert_eq!(power.state(), PowerState::WaitForDevice);

        assert_eq!(power.process(1_200), None);
        status.0.set(true);
        assert_eq!(power.process(1_300), None);
        assert_eq!(power.process(1_400), Some(Ok(())));
        assert_eq!(power.state(), PowerState::Ready);
    }

    #[test]
    fn test_status_timeout() {
        let (mut power, _pwrkey, _status) = control(true);
        assert_eq!(power.sleep(0), Ok(Transition::Pending));
        assert_eq!(power.process(1_000), None);

        let mut now = 1_000;
        let result = loop {
            now += 200;
            if let Some(result) = power.process(now) {
                break result;
            }
        };
        assert_eq!(result, Err(AtError::Timeout));
        assert_eq!(now, 16_000);
        assert_eq!(power.state(), PowerState::Ready);
    }
}
