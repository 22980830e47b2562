//! Millisecond timers driven by the caller's clock.
//!
//! Nothing here reads a clock: every call takes `now_ms` from the super-loop,
//! which keeps the state machines deterministic under test.

/// One-shot timer with callback-on-expiry semantics, polled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShotTimer {
    deadline: Option<u64>,
}

impl OneShotTimer {
    pub const fn new() -> Self {
        OneShotTimer { deadline: None }
    }

    /// (Re)start the timer. A running timer is restarted, not extended.
    pub fn start(&mut self, now_ms: u64, duration_ms: u32) {
        self.deadline = Some(now_ms.saturating_add(u64::from(duration_ms)));
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true once when the deadline has passed, and stops the timer.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Periodic timer; fires at most once per `poll` even if several periods elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodicTimer {
    period_ms: u32,
    next: Option<u64>,
}

impl PeriodicTimer {
    pub const fn new(period_ms: u32) -> Self {
        PeriodicTimer {
            period_ms,
            next: None,
        }
    }

    pub fn start(&mut self, now_ms: u64) {
        self.next = Some(now_ms.saturating_add(u64::from(self.period_ms)));
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next {
            Some(next) if now_ms >= next => {
                self.next = Some(now_ms.saturating_add(u64::from(self.period_ms)));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot() {
        let mut timer = OneShotTimer::new();
        assert!(!timer.poll(0));

        timer.start(100, 50);
        assert!(timer.is_running());
        assert!(!timer.poll(149));
        assert!(timer.poll(150));
        assert!(!timer.is_running());
        assert!(!timer.poll(200));
    }

    #[test]
    fn test_one_shot_restart() {
        let mut timer = OneShotTimer::new();
        timer.start(0, 100);
        timer.start(50, 100);
        assert!(!timer.poll(120));
        assert!(timer.poll(150));
    }

    #[test]
    fn test_periodic() {
        let mut timer = PeriodicTimer::new(200);
        timer.start(0);
        assert!(!timer.poll(199));
        assert!(timer.poll(200));
        assert!(!timer.poll(300));
        assert!(timer.poll(400));
        timer.stop();
        assert!(!timer.poll(10_000));
    }
}
